//! JSON persistence of vine and pair-copula models.
use serde::Deserialize;
use serde::Serialize;

use super::structure::RVineStructure;
use super::triangular_array::TriangularArray;
use super::vine::PairCopulaStore;
use super::vine::Vinecop;
use crate::copulas::bivariate::Bicop;
use crate::copulas::bivariate::BicopFamily;
use crate::error::VineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BicopRecord {
  pub family: BicopFamily,
  pub rotation: u16,
  pub parameters: Vec<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub loglik: Option<f64>,
  #[serde(default)]
  pub nobs: usize,
}

impl From<&Bicop> for BicopRecord {
  fn from(bicop: &Bicop) -> Self {
    Self {
      family: bicop.get_family(),
      rotation: bicop.get_rotation(),
      parameters: bicop.get_parameters().to_vec(),
      loglik: bicop.get_loglik().ok(),
      nobs: bicop.get_nobs(),
    }
  }
}

impl TryFrom<BicopRecord> for Bicop {
  type Error = VineError;

  fn try_from(record: BicopRecord) -> Result<Self, Self::Error> {
    let mut bicop = Bicop::new(record.family, record.rotation, &record.parameters)?;
    if let Some(loglik) = record.loglik {
      bicop.set_fit_stats(loglik, record.nobs);
    }
    Ok(bicop)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VinecopRecord {
  pub d: usize,
  pub trunc_lvl: usize,
  pub order: Vec<usize>,
  /// Structure array in natural order, one row per tree.
  pub struct_array: Vec<Vec<usize>>,
  pub pair_copulas: Vec<Vec<BicopRecord>>,
  #[serde(default)]
  pub threshold: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub loglik: Option<f64>,
  #[serde(default)]
  pub nobs: usize,
}

impl Bicop {
  pub fn to_json(&self) -> Result<String, VineError> {
    Ok(serde_json::to_string_pretty(&BicopRecord::from(self))?)
  }

  pub fn from_json(json: &str) -> Result<Self, VineError> {
    let record: BicopRecord = serde_json::from_str(json)?;
    Bicop::try_from(record)
  }
}

impl Vinecop {
  pub fn to_record(&self) -> VinecopRecord {
    let structure = self.get_rvine_structure();
    VinecopRecord {
      d: self.get_dim(),
      trunc_lvl: self.get_trunc_lvl(),
      order: structure.get_order().to_vec(),
      struct_array: structure.get_struct_array(true).rows().to_vec(),
      pair_copulas: self
        .get_all_pair_copulas()
        .rows()
        .iter()
        .map(|row| row.iter().map(BicopRecord::from).collect())
        .collect(),
      threshold: self.get_threshold(),
      loglik: self.get_loglik().ok(),
      nobs: self.get_nobs(),
    }
  }

  /// Rebuilds a model; the structure is fully validated.
  pub fn from_record(record: VinecopRecord) -> Result<Self, VineError> {
    let d = record.d;
    if record.order.len() != d {
      return Err(VineError::Serialization(format!(
        "order has {} entries for dimension {d}",
        record.order.len()
      )));
    }
    if record.struct_array.len() != record.trunc_lvl || record.pair_copulas.len() != record.trunc_lvl {
      return Err(VineError::Serialization(format!(
        "truncation level {} disagrees with {} structure rows and {} pair-copula rows",
        record.trunc_lvl,
        record.struct_array.len(),
        record.pair_copulas.len()
      )));
    }

    let struct_array = rows_or_empty(record.struct_array, d)?;
    let structure = RVineStructure::from_order_and_struct(record.order, struct_array, true)?;

    let rows = record
      .pair_copulas
      .into_iter()
      .map(|row| row.into_iter().map(Bicop::try_from).collect::<Result<Vec<_>, _>>())
      .collect::<Result<Vec<_>, _>>()?;
    let pair_copulas: PairCopulaStore = rows_or_empty(rows, d)?;

    let mut vine = Vinecop::from_structure(structure, pair_copulas)?;
    vine.set_fit_info(record.threshold, record.loglik, record.nobs);
    Ok(vine)
  }

  pub fn to_json(&self) -> Result<String, VineError> {
    Ok(serde_json::to_string_pretty(&self.to_record())?)
  }

  pub fn from_json(json: &str) -> Result<Self, VineError> {
    let record: VinecopRecord = serde_json::from_str(json)?;
    Self::from_record(record)
  }
}

fn rows_or_empty<T: Clone + Default>(rows: Vec<Vec<T>>, d: usize) -> Result<TriangularArray<T>, VineError> {
  if rows.is_empty() {
    return Ok(TriangularArray::with_trunc(d, 0));
  }
  let array = TriangularArray::from_rows(rows)?;
  if array.dim() != d {
    return Err(VineError::Serialization(format!(
      "rows describe dimension {} but the record has dimension {d}",
      array.dim()
    )));
  }
  Ok(array)
}

#[cfg(test)]
mod tests {
  use ndarray::array;

  use super::*;

  fn sample_vine() -> Vinecop {
    let structure = RVineStructure::c_vine(&[3, 1, 4, 2], usize::MAX).unwrap();
    let mut store = PairCopulaStore::new(4);
    store[(0, 0)] = Bicop::new(BicopFamily::Gumbel, 180, &[1.8]).unwrap();
    store[(0, 1)] = Bicop::new(BicopFamily::Student, 0, &[0.4, 6.0]).unwrap();
    store[(0, 2)] = Bicop::new(BicopFamily::Frank, 0, &[-3.0]).unwrap();
    store[(1, 0)] = Bicop::new(BicopFamily::Bb8, 270, &[2.0, 0.6]).unwrap();
    Vinecop::from_structure(structure, store).unwrap()
  }

  #[test]
  fn vine_survives_json() {
    let vine = sample_vine();
    let json = vine.to_json().unwrap();
    let back = Vinecop::from_json(&json).unwrap();
    assert_eq!(back.get_matrix(), vine.get_matrix());
    assert_eq!(back.get_all_pair_copulas(), vine.get_all_pair_copulas());

    let u = array![[0.2, 0.5, 0.7, 0.9], [0.6, 0.1, 0.3, 0.4]];
    assert_eq!(back.pdf(u.view(), 1).unwrap(), vine.pdf(u.view(), 1).unwrap());
  }

  #[test]
  fn truncated_vine_survives_json() {
    let mut vine = sample_vine();
    vine.truncate(0);
    let back = Vinecop::from_json(&vine.to_json().unwrap()).unwrap();
    assert_eq!(back.get_trunc_lvl(), 0);
    assert_eq!(back.get_order(), vine.get_order());
  }

  #[test]
  fn invalid_structure_is_rejected() {
    let mut record = sample_vine().to_record();
    record.struct_array[1][0] = 3;
    assert!(Vinecop::from_record(record).is_err());

    let mut record = sample_vine().to_record();
    record.trunc_lvl = 1;
    assert!(matches!(Vinecop::from_record(record), Err(VineError::Serialization(_))));

    assert!(matches!(Vinecop::from_json("{\"d\": 3"), Err(VineError::Serialization(_))));
  }

  #[test]
  fn bicop_survives_json() {
    let mut bicop = Bicop::new(BicopFamily::Clayton, 90, &[2.5]).unwrap();
    bicop.set_fit_stats(-12.5, 40);
    let json = bicop.to_json().unwrap();
    assert!(json.contains("\"clayton\""));
    let back = Bicop::from_json(&json).unwrap();
    assert_eq!(back, bicop);
    assert_eq!(back.get_loglik().unwrap(), -12.5);

    let bad = json.replace("2.5", "99.0");
    assert!(matches!(Bicop::from_json(&bad), Err(VineError::Validation(_))));
  }
}
