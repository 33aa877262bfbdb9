//! # Bivariate
//!
//! $$
//! C_{90}(u_1,u_2)=u_2-C(1-u_1,u_2),\quad
//! C_{180}(u_1,u_2)=u_1+u_2-1+C(1-u_1,1-u_2),\quad
//! C_{270}(u_1,u_2)=u_1-C(u_1,1-u_2)
//! $$
//!
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use gauss_quad::GaussLegendre;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;
use roots::find_root_brent;
use roots::SimpleConvergency;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use self::controls::FitControlsBicop;
use self::controls::ParametricMethod;
use self::optimizer::minimize;
use self::optimizer::minimize_scalar;
use self::optimizer::DEFAULT_TOL;
use crate::copulas::correlation::kendall_tau;
use crate::copulas::empirical::trim_unit;
use crate::copulas::empirical::UNIT_EPS;
use crate::copulas::samples::simulate_uniform;
use crate::error::VineError;
use crate::parallel::WorkerPool;
use crate::traits::BivariateExt;

pub mod archimedean;
pub mod bb;
pub mod clayton;
pub mod controls;
pub mod frank;
pub mod gaussian;
pub mod gumbel;
pub mod independence;
pub mod joe;
pub mod optimizer;
pub mod select;
pub mod student;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BicopFamily {
  Indep,
  Gaussian,
  Student,
  Clayton,
  Gumbel,
  Frank,
  Joe,
  Bb1,
  Bb6,
  Bb7,
  Bb8,
}

impl BicopFamily {
  pub fn all() -> Vec<BicopFamily> {
    use BicopFamily::*;
    vec![
      Indep, Gaussian, Student, Clayton, Gumbel, Frank, Joe, Bb1, Bb6, Bb7, Bb8,
    ]
  }

  pub fn one_par() -> Vec<BicopFamily> {
    use BicopFamily::*;
    vec![Gaussian, Clayton, Gumbel, Frank, Joe]
  }

  pub fn two_par() -> Vec<BicopFamily> {
    use BicopFamily::*;
    vec![Student, Bb1, Bb6, Bb7, Bb8]
  }

  pub fn elliptical() -> Vec<BicopFamily> {
    vec![BicopFamily::Gaussian, BicopFamily::Student]
  }

  pub fn archimedean() -> Vec<BicopFamily> {
    use BicopFamily::*;
    vec![Clayton, Gumbel, Frank, Joe, Bb1, Bb6, Bb7, Bb8]
  }

  pub fn bb() -> Vec<BicopFamily> {
    use BicopFamily::*;
    vec![Bb1, Bb6, Bb7, Bb8]
  }

  /// Families covering both signs of dependence without rotation.
  pub fn rotationless() -> Vec<BicopFamily> {
    use BicopFamily::*;
    vec![Indep, Gaussian, Student, Frank]
  }

  /// Stronger dependence in the lower tail.
  pub fn lt() -> Vec<BicopFamily> {
    use BicopFamily::*;
    vec![Clayton, Bb1, Bb7]
  }

  /// Stronger dependence in the upper tail.
  pub fn ut() -> Vec<BicopFamily> {
    use BicopFamily::*;
    vec![Gumbel, Joe, Bb1, Bb6, Bb7, Bb8]
  }

  /// Families for which `itau` estimation is available.
  pub fn itau() -> Vec<BicopFamily> {
    use BicopFamily::*;
    vec![Indep, Gaussian, Student, Clayton, Gumbel, Frank, Joe]
  }

  pub fn is_rotationless(&self) -> bool {
    Self::rotationless().contains(self)
  }

  pub fn is_bb(&self) -> bool {
    Self::bb().contains(self)
  }

  pub fn has_itau(&self) -> bool {
    Self::itau().contains(self)
  }

  pub fn name(&self) -> &'static str {
    match self {
      BicopFamily::Indep => "Independence",
      BicopFamily::Gaussian => "Gaussian",
      BicopFamily::Student => "Student",
      BicopFamily::Clayton => "Clayton",
      BicopFamily::Gumbel => "Gumbel",
      BicopFamily::Frank => "Frank",
      BicopFamily::Joe => "Joe",
      BicopFamily::Bb1 => "BB1",
      BicopFamily::Bb6 => "BB6",
      BicopFamily::Bb7 => "BB7",
      BicopFamily::Bb8 => "BB8",
    }
  }

  /// The formulas of this family.
  pub fn kernel(&self) -> &'static dyn BivariateExt {
    match self {
      BicopFamily::Indep => &independence::Independence,
      BicopFamily::Gaussian => &gaussian::Gaussian,
      BicopFamily::Student => &student::Student,
      BicopFamily::Clayton => &clayton::Clayton,
      BicopFamily::Gumbel => &gumbel::Gumbel,
      BicopFamily::Frank => &frank::Frank,
      BicopFamily::Joe => &joe::Joe,
      BicopFamily::Bb1 => &bb::Bb1,
      BicopFamily::Bb6 => &bb::Bb6,
      BicopFamily::Bb7 => &bb::Bb7,
      BicopFamily::Bb8 => &bb::Bb8,
    }
  }
}

impl fmt::Display for BicopFamily {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

impl FromStr for BicopFamily {
  type Err = VineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let family = match s.to_ascii_lowercase().as_str() {
      "indep" | "independence" => BicopFamily::Indep,
      "gaussian" => BicopFamily::Gaussian,
      "student" => BicopFamily::Student,
      "clayton" => BicopFamily::Clayton,
      "gumbel" => BicopFamily::Gumbel,
      "frank" => BicopFamily::Frank,
      "joe" => BicopFamily::Joe,
      "bb1" => BicopFamily::Bb1,
      "bb6" => BicopFamily::Bb6,
      "bb7" => BicopFamily::Bb7,
      "bb8" => BicopFamily::Bb8,
      other => {
        return Err(VineError::Validation(format!(
          "unknown copula family '{other}'"
        )))
      }
    };
    Ok(family)
  }
}

/// Copy of `u` with its two columns exchanged.
pub fn swap_columns(u: ArrayView2<f64>) -> Array2<f64> {
  let mut out = u.to_owned();
  out.invert_axis(Axis(1));
  out
}

fn reflect(u: ArrayView2<f64>, first: bool, second: bool) -> Array2<f64> {
  let mut out = u.mapv(trim_unit);
  if first {
    out.column_mut(0).mapv_inplace(|x| 1.0 - x);
  }
  if second {
    out.column_mut(1).mapv_inplace(|x| 1.0 - x);
  }
  out
}

/// Solves `h1(u_1, v) = p` row by row for `v`, with `(u_1, p)` in the rows of `u`.
pub(crate) fn invert_hfunc1<F>(u: ArrayView2<f64>, h1: F) -> Array1<f64>
where
  F: Fn(f64, f64) -> f64,
{
  let (lo, hi) = (UNIT_EPS, 1.0 - UNIT_EPS);
  u.rows()
    .into_iter()
    .map(|row| {
      let (u1, p) = (row[0], row[1]);
      let f = |v: f64| h1(u1, v) - p;
      if f(lo) >= 0.0 {
        return lo;
      }
      if f(hi) <= 0.0 {
        return hi;
      }

      let mut convergency = SimpleConvergency {
        eps: 1e-13,
        max_iter: 200,
      };
      find_root_brent(lo, hi, f, &mut convergency).unwrap_or_else(|_| bisect(&f, lo, hi))
    })
    .collect()
}

const QUAD_DEGREE: usize = 64;

static QUADRATURE: OnceLock<Option<GaussLegendre>> = OnceLock::new();

/// Gauss-Legendre approximation of the integral of `f` over `[a, b]`.
pub(crate) fn integrate<F>(f: F, a: f64, b: f64) -> f64
where
  F: Fn(f64) -> f64,
{
  match QUADRATURE.get_or_init(|| GaussLegendre::new(QUAD_DEGREE).ok()) {
    Some(quad) => quad.integrate(a, b, f),
    None => f64::NAN,
  }
}

fn bisect<F: Fn(f64) -> f64>(f: &F, mut lo: f64, mut hi: f64) -> f64 {
  for _ in 0..80 {
    let mid = 0.5 * (lo + hi);
    if f(mid) < 0.0 {
      lo = mid;
    } else {
      hi = mid;
    }
  }
  0.5 * (lo + hi)
}

fn check_data(u: ArrayView2<f64>) -> Result<(), VineError> {
  if u.ncols() != 2 {
    return Err(VineError::DimensionMismatch(format!(
      "pair-copula data must have 2 columns; got {}",
      u.ncols()
    )));
  }
  if let Some(bad) = u.iter().find(|x| !(0.0..=1.0).contains(*x)) {
    return Err(VineError::Validation(format!(
      "pair-copula data must lie in [0, 1]; found {bad}"
    )));
  }
  Ok(())
}

/// A bivariate copula: family, rotation (0, 90, 180 or 270 degrees) and parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Bicop {
  family: BicopFamily,
  rotation: u16,
  parameters: Vec<f64>,
  loglik: Option<f64>,
  nobs: usize,
}

impl Default for Bicop {
  fn default() -> Self {
    Self {
      family: BicopFamily::Indep,
      rotation: 0,
      parameters: vec![],
      loglik: None,
      nobs: 0,
    }
  }
}

impl Bicop {
  pub fn new(family: BicopFamily, rotation: u16, parameters: &[f64]) -> Result<Self, VineError> {
    let mut bicop = Self {
      family,
      rotation: 0,
      parameters: vec![],
      loglik: None,
      nobs: 0,
    };
    bicop.set_rotation(rotation)?;
    bicop.set_parameters(parameters)?;
    Ok(bicop)
  }

  /// A member of `family` at its default starting parameters.
  pub fn from_family(family: BicopFamily) -> Self {
    Self {
      family,
      rotation: 0,
      parameters: family.kernel().start_parameters(),
      loglik: None,
      nobs: 0,
    }
  }

  pub fn get_family(&self) -> BicopFamily {
    self.family
  }

  pub fn get_rotation(&self) -> u16 {
    self.rotation
  }

  pub fn get_parameters(&self) -> &[f64] {
    &self.parameters
  }

  pub fn get_parameter_bounds(&self) -> (Vec<f64>, Vec<f64>) {
    self.family.kernel().parameter_bounds()
  }

  pub fn set_rotation(&mut self, rotation: u16) -> Result<(), VineError> {
    if ![0, 90, 180, 270].contains(&rotation) {
      return Err(VineError::Validation(format!(
        "rotation must be one of 0, 90, 180, 270; got {rotation}"
      )));
    }
    if rotation != 0 && self.family.is_rotationless() {
      return Err(VineError::Validation(format!(
        "the {} family does not support rotation {rotation}",
        self.family
      )));
    }
    self.rotation = rotation;
    Ok(())
  }

  pub fn set_parameters(&mut self, parameters: &[f64]) -> Result<(), VineError> {
    let (lb, ub) = self.get_parameter_bounds();
    if parameters.len() != lb.len() {
      return Err(VineError::Validation(format!(
        "the {} family needs {} parameters; got {}",
        self.family,
        lb.len(),
        parameters.len()
      )));
    }
    for (i, &p) in parameters.iter().enumerate() {
      if !(p >= lb[i] && p <= ub[i]) {
        return Err(VineError::Validation(format!(
          "parameter {i} of the {} family must be in [{}, {}]; got {p}",
          self.family, lb[i], ub[i]
        )));
      }
    }
    self.parameters = parameters.to_vec();
    Ok(())
  }

  /// Number of parameters entering information criteria.
  pub fn get_npars(&self) -> f64 {
    match self.family {
      BicopFamily::Indep => 0.0,
      _ => self.parameters.len() as f64,
    }
  }

  pub fn get_nobs(&self) -> usize {
    self.nobs
  }

  pub fn get_loglik(&self) -> Result<f64, VineError> {
    self.loglik.ok_or_else(|| {
      VineError::NotFitted(format!(
        "the {} copula was not fitted to data; loglik is unavailable",
        self.family
      ))
    })
  }

  pub fn get_aic(&self) -> Result<f64, VineError> {
    Ok(-2.0 * self.get_loglik()? + 2.0 * self.get_npars())
  }

  pub fn get_bic(&self) -> Result<f64, VineError> {
    Ok(-2.0 * self.get_loglik()? + (self.nobs as f64).ln() * self.get_npars())
  }

  pub(crate) fn set_fit_stats(&mut self, loglik: f64, nobs: usize) {
    self.loglik = Some(loglik);
    self.nobs = nobs;
  }

  /// Kendall's tau of the (rotated) copula.
  pub fn get_tau(&self) -> f64 {
    self.parameters_to_tau(&self.parameters)
  }

  pub fn parameters_to_tau(&self, parameters: &[f64]) -> f64 {
    let tau = self.family.kernel().parameters_to_tau(parameters);
    if self.rotation == 90 || self.rotation == 270 {
      -tau
    } else {
      tau
    }
  }

  /// Parameters of the (rotated) copula matching Kendall's tau.
  pub fn tau_to_parameters(&self, tau: f64) -> Result<Vec<f64>, VineError> {
    let tau = if self.rotation == 90 || self.rotation == 270 {
      -tau
    } else {
      tau
    };
    self.family.kernel().tau_to_parameters(tau)
  }

  /// Adjusts the model to swapped arguments: `C'(u_1, u_2) = C(u_2, u_1)`.
  pub fn flip(&mut self) {
    match self.rotation {
      90 => self.rotation = 270,
      270 => self.rotation = 90,
      _ => {}
    }
  }

  pub fn pdf(&self, u: ArrayView2<f64>) -> Result<Array1<f64>, VineError> {
    check_data(u)?;
    self.reject_nan(self.pdf_values(u), "pdf")
  }

  pub fn cdf(&self, u: ArrayView2<f64>) -> Result<Array1<f64>, VineError> {
    check_data(u)?;
    Ok(self.cdf_raw(u))
  }

  pub fn hfunc1(&self, u: ArrayView2<f64>) -> Result<Array1<f64>, VineError> {
    check_data(u)?;
    self.reject_nan(self.h_values(HFunction::H1, u), "hfunc1")
  }

  pub fn hfunc2(&self, u: ArrayView2<f64>) -> Result<Array1<f64>, VineError> {
    check_data(u)?;
    self.reject_nan(self.h_values(HFunction::H2, u), "hfunc2")
  }

  pub fn hinv1(&self, u: ArrayView2<f64>) -> Result<Array1<f64>, VineError> {
    check_data(u)?;
    self.reject_nan(self.h_values(HFunction::Hinv1, u), "hinv1")
  }

  pub fn hinv2(&self, u: ArrayView2<f64>) -> Result<Array1<f64>, VineError> {
    check_data(u)?;
    self.reject_nan(self.h_values(HFunction::Hinv2, u), "hinv2")
  }

  fn reflections(&self) -> (bool, bool) {
    match self.rotation {
      90 => (true, false),
      180 => (true, true),
      270 => (false, true),
      _ => (false, false),
    }
  }

  /// Density values; NaN where the kernel breaks down numerically.
  fn pdf_values(&self, u: ArrayView2<f64>) -> Array1<f64> {
    if self.family == BicopFamily::Indep {
      return Array1::ones(u.nrows());
    }
    let (a, b) = self.reflections();
    self.family.kernel().pdf(reflect(u, a, b).view(), &self.parameters)
  }

  /// h-function values of the rotated copula, clamped to [0, 1]; NaN is kept.
  fn h_values(&self, which: HFunction, u: ArrayView2<f64>) -> Array1<f64> {
    let (a, b) = self.reflections();
    let kernel = self.family.kernel();
    let x = reflect(u, a, b);
    let (h, complement) = match which {
      HFunction::H1 => (kernel.hfunc1(x.view(), &self.parameters), matches!(self.rotation, 180 | 270)),
      HFunction::H2 => (kernel.hfunc2(x.view(), &self.parameters), matches!(self.rotation, 90 | 180)),
      HFunction::Hinv1 => (kernel.hinv1(x.view(), &self.parameters), matches!(self.rotation, 180 | 270)),
      HFunction::Hinv2 => (kernel.hinv2(x.view(), &self.parameters), matches!(self.rotation, 90 | 180)),
    };
    h.mapv(|v| (if complement { 1.0 - v } else { v }).clamp(0.0, 1.0))
  }

  fn reject_nan(&self, values: Array1<f64>, what: &str) -> Result<Array1<f64>, VineError> {
    match values.iter().position(|x| x.is_nan()) {
      Some(row) => Err(VineError::Estimation(format!(
        "{what} of the {self} copula is not a number at row {row}"
      ))),
      None => Ok(values),
    }
  }

  /// Replaces NaN by `fallback` and logs how many values were affected.
  fn patch_nan(&self, mut values: Array1<f64>, what: &str, fallback: f64) -> Array1<f64> {
    let count = values.iter().filter(|x| x.is_nan()).count();
    if count > 0 {
      warn!(
        family = %self.family,
        rotation = self.rotation,
        count,
        fallback,
        "non-finite {what} values replaced"
      );
      values.mapv_inplace(|x| if x.is_nan() { fallback } else { x });
    }
    values
  }

  pub(crate) fn pdf_raw(&self, u: ArrayView2<f64>) -> Array1<f64> {
    self.patch_nan(self.pdf_values(u), "pdf", 0.0)
  }

  pub(crate) fn cdf_raw(&self, u: ArrayView2<f64>) -> Array1<f64> {
    let (a, b) = self.reflections();
    let kernel = self.family.kernel();
    let c = kernel.cdf(reflect(u, a, b).view(), &self.parameters);
    let u1 = u.column(0).mapv(trim_unit);
    let u2 = u.column(1).mapv(trim_unit);
    let c = match self.rotation {
      90 => u2 - c,
      180 => &u1 + &u2 - 1.0 + c,
      270 => u1 - c,
      _ => c,
    };
    c.mapv(|x| x.clamp(0.0, 1.0))
  }

  pub(crate) fn hfunc1_raw(&self, u: ArrayView2<f64>) -> Array1<f64> {
    self.patch_nan(self.h_values(HFunction::H1, u), "hfunc1", 0.5)
  }

  pub(crate) fn hfunc2_raw(&self, u: ArrayView2<f64>) -> Array1<f64> {
    self.patch_nan(self.h_values(HFunction::H2, u), "hfunc2", 0.5)
  }

  pub(crate) fn hinv1_raw(&self, u: ArrayView2<f64>) -> Array1<f64> {
    self.patch_nan(self.h_values(HFunction::Hinv1, u), "hinv1", 0.5)
  }

  pub(crate) fn hinv2_raw(&self, u: ArrayView2<f64>) -> Array1<f64> {
    self.patch_nan(self.h_values(HFunction::Hinv2, u), "hinv2", 0.5)
  }

  pub fn loglik(&self, u: ArrayView2<f64>) -> Result<f64, VineError> {
    check_data(u)?;
    Ok(self.pdf_raw(u).mapv(f64::ln).sum())
  }

  pub fn aic(&self, u: ArrayView2<f64>) -> Result<f64, VineError> {
    Ok(-2.0 * self.loglik(u)? + 2.0 * self.get_npars())
  }

  pub fn bic(&self, u: ArrayView2<f64>) -> Result<f64, VineError> {
    Ok(-2.0 * self.loglik(u)? + (u.nrows() as f64).ln() * self.get_npars())
  }

  /// BIC with a prior probability `psi0` that the copula is not independence.
  pub fn mbic(&self, u: ArrayView2<f64>, psi0: f64) -> Result<f64, VineError> {
    let is_indep = self.family == BicopFamily::Indep;
    let log_prior = if is_indep {
      (1.0 - psi0).ln()
    } else {
      psi0.ln()
    };
    Ok(self.bic(u)? - 2.0 * log_prior)
  }

  /// `n` draws; the second column comes from inverting the first h-function.
  pub fn simulate(&self, n: usize, qrng: bool, seeds: &[u64]) -> Array2<f64> {
    let mut u = simulate_uniform(n, 2, qrng, seeds);
    let v = self.hinv1_raw(u.view());
    u.column_mut(1).assign(&v);
    u
  }

  /// Estimates the parameters for the current family and rotation.
  pub fn fit(&mut self, data: ArrayView2<f64>, controls: &FitControlsBicop) -> Result<(), VineError> {
    check_data(data)?;
    controls.check()?;
    let n = data.nrows();
    if self.family == BicopFamily::Indep {
      self.parameters = vec![];
      self.set_fit_stats(0.0, n);
      return Ok(());
    }

    let tau = kendall_tau(data.column(0), data.column(1));
    let itau = controls.parametric_method == ParametricMethod::Itau && self.family.has_itau();
    if itau {
      self.check_sign(tau)?;
    }

    let kernel = self.family.kernel();
    let (lb, ub) = kernel.parameter_bounds();
    let (a, b) = self.reflections();
    let rotated = reflect(data, a, b);
    let neg_loglik = |par: &[f64]| -> f64 {
      let ll = kernel.pdf(rotated.view(), par).mapv(f64::ln).sum();
      if ll.is_finite() {
        -ll
      } else {
        1e100
      }
    };

    let start = match self.tau_to_parameters(tau) {
      Ok(mut par) if self.family == BicopFamily::Student => {
        par[1] = kernel.start_parameters()[1];
        par
      }
      Ok(par) => par,
      Err(_) => kernel.start_parameters(),
    };

    let parameters = if itau {
      if start.len() == 1 {
        start
      } else {
        // main parameter from tau, the rest by profile likelihood
        let main = start[0];
        let profiled = minimize(
          |rest: &[f64]| {
            let mut par = vec![main];
            par.extend_from_slice(rest);
            neg_loglik(&par)
          },
          &lb[1..],
          &ub[1..],
          &start[1..],
          DEFAULT_TOL,
        )?;
        let mut par = vec![main];
        par.extend(profiled);
        par
      }
    } else if lb.len() == 1 {
      vec![minimize_scalar(|x| neg_loglik(&[x]), lb[0], ub[0], start[0], DEFAULT_TOL)?]
    } else {
      minimize(neg_loglik, &lb, &ub, &start, DEFAULT_TOL)?
    };

    self.set_parameters(&parameters)?;
    let loglik = self.pdf_raw(data).mapv(f64::ln).sum();
    self.set_fit_stats(loglik, n);
    Ok(())
  }

  fn check_sign(&self, tau: f64) -> Result<(), VineError> {
    if self.family.is_rotationless() {
      return Ok(());
    }
    let negative_rotation = self.rotation == 90 || self.rotation == 270;
    if (tau > 0.0 && negative_rotation) || (tau < 0.0 && !negative_rotation) {
      return Err(VineError::Compatibility(format!(
        "the {} copula rotated by {} degrees cannot model Kendall's tau = {tau:.4}",
        self.family, self.rotation
      )));
    }
    Ok(())
  }

  /// Selects family and rotation among `controls.family_set` and fits it.
  pub fn select(&mut self, data: ArrayView2<f64>, controls: &FitControlsBicop) -> Result<(), VineError> {
    WorkerPool::scoped(controls.num_threads, |pool| self.select_in(data, controls, pool))
  }

  /// Like [`Bicop::select`], fitting the candidates on a pool owned by the caller.
  pub(crate) fn select_in(
    &mut self,
    data: ArrayView2<f64>,
    controls: &FitControlsBicop,
    pool: &WorkerPool,
  ) -> Result<(), VineError> {
    check_data(data)?;
    controls.check()?;
    *self = select::select_bicop(data, controls, pool)?;
    Ok(())
  }
}

#[derive(Debug, Clone, Copy)]
enum HFunction {
  H1,
  H2,
  Hinv1,
  Hinv2,
}

impl fmt::Display for Bicop {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.family == BicopFamily::Indep {
      return write!(f, "{}", self.family);
    }
    let par: Vec<String> = self.parameters.iter().map(|p| format!("{p:.4}")).collect();
    write!(
      f,
      "{} {}°, parameters = {}",
      self.family,
      self.rotation,
      par.join(", ")
    )
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use ndarray::s;
  use tracing_test::traced_test;

  use super::*;

  fn grid() -> Array2<f64> {
    let pts = [0.05, 0.2, 0.45, 0.7, 0.93];
    let mut u = Array2::<f64>::zeros((pts.len() * pts.len(), 2));
    for (i, &a) in pts.iter().enumerate() {
      for (j, &b) in pts.iter().enumerate() {
        u[[i * pts.len() + j, 0]] = a;
        u[[i * pts.len() + j, 1]] = b;
      }
    }
    u
  }

  fn examples() -> Vec<Bicop> {
    vec![
      Bicop::new(BicopFamily::Gaussian, 0, &[0.6]).unwrap(),
      Bicop::new(BicopFamily::Student, 0, &[-0.4, 6.0]).unwrap(),
      Bicop::new(BicopFamily::Clayton, 90, &[2.0]).unwrap(),
      Bicop::new(BicopFamily::Gumbel, 180, &[1.8]).unwrap(),
      Bicop::new(BicopFamily::Frank, 0, &[-4.0]).unwrap(),
      Bicop::new(BicopFamily::Joe, 270, &[2.2]).unwrap(),
      Bicop::new(BicopFamily::Bb1, 0, &[0.8, 1.5]).unwrap(),
      Bicop::new(BicopFamily::Bb6, 180, &[1.5, 1.5]).unwrap(),
      Bicop::new(BicopFamily::Bb7, 90, &[1.5, 0.8]).unwrap(),
      Bicop::new(BicopFamily::Bb8, 0, &[3.0, 0.7]).unwrap(),
    ]
  }

  #[test]
  fn hinv_inverts_hfunc_for_every_family_and_rotation() {
    let u = grid();
    for bicop in examples() {
      let h1 = bicop.hfunc1(u.view()).unwrap();
      let mut w = u.clone();
      w.column_mut(1).assign(&h1);
      let back = bicop.hinv1(w.view()).unwrap();
      for (x, y) in back.iter().zip(u.column(1).iter()) {
        assert_abs_diff_eq!(*x, *y, epsilon = 1e-6);
      }

      let h2 = bicop.hfunc2(u.view()).unwrap();
      let mut w = u.clone();
      w.column_mut(0).assign(&h2);
      let back = bicop.hinv2(w.view()).unwrap();
      for (x, y) in back.iter().zip(u.column(0).iter()) {
        assert_abs_diff_eq!(*x, *y, epsilon = 1e-6);
      }
    }
  }

  #[test]
  fn hfunc_matches_cdf_derivative() {
    let u = grid();
    let eps = 1e-5;
    for bicop in examples() {
      let h1 = bicop.hfunc1(u.view()).unwrap();
      let h2 = bicop.hfunc2(u.view()).unwrap();
      let mut up = u.clone();
      up.column_mut(0).mapv_inplace(|x| x + eps);
      let mut dn = u.clone();
      dn.column_mut(0).mapv_inplace(|x| x - eps);
      let d1 = (bicop.cdf(up.view()).unwrap() - bicop.cdf(dn.view()).unwrap()) / (2.0 * eps);

      let mut up = u.clone();
      up.column_mut(1).mapv_inplace(|x| x + eps);
      let mut dn = u.clone();
      dn.column_mut(1).mapv_inplace(|x| x - eps);
      let d2 = (bicop.cdf(up.view()).unwrap() - bicop.cdf(dn.view()).unwrap()) / (2.0 * eps);

      for i in 0..u.nrows() {
        assert_abs_diff_eq!(h1[i], d1[i], epsilon = 2e-3);
        assert_abs_diff_eq!(h2[i], d2[i], epsilon = 2e-3);
      }
    }
  }

  #[test]
  fn pdf_matches_hfunc_derivative() {
    let u = grid();
    let eps = 1e-5;
    for bicop in examples() {
      let pdf = bicop.pdf(u.view()).unwrap();
      let mut up = u.clone();
      up.column_mut(1).mapv_inplace(|x| x + eps);
      let mut dn = u.clone();
      dn.column_mut(1).mapv_inplace(|x| x - eps);
      let d = (bicop.hfunc1(up.view()).unwrap() - bicop.hfunc1(dn.view()).unwrap()) / (2.0 * eps);
      for i in 0..u.nrows() {
        assert_abs_diff_eq!(pdf[i], d[i], epsilon = 1e-3 * pdf[i].max(1.0));
      }
    }
  }

  #[test]
  fn tau_sign_follows_rotation() {
    let mut bicop = Bicop::new(BicopFamily::Clayton, 0, &[2.0]).unwrap();
    assert_abs_diff_eq!(bicop.get_tau(), 0.5, epsilon = 1e-12);
    bicop.set_rotation(90).unwrap();
    assert_abs_diff_eq!(bicop.get_tau(), -0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(bicop.tau_to_parameters(-0.5).unwrap()[0], 2.0, epsilon = 1e-10);
  }

  #[test]
  fn flip_swaps_arguments() {
    let u = grid();
    let swapped = swap_columns(u.view());
    for mut bicop in examples() {
      let before = bicop.pdf(swapped.view()).unwrap();
      let h1_before = bicop.hfunc1(swapped.view()).unwrap();
      bicop.flip();
      let after = bicop.pdf(u.view()).unwrap();
      let h2_after = bicop.hfunc2(u.view()).unwrap();
      for i in 0..u.nrows() {
        assert_abs_diff_eq!(before[i], after[i], epsilon = 1e-10);
        assert_abs_diff_eq!(h1_before[i], h2_after[i], epsilon = 1e-10);
      }
    }
  }

  #[test]
  fn rejects_invalid_models_and_data() {
    assert!(Bicop::new(BicopFamily::Gaussian, 90, &[0.5]).is_err());
    assert!(Bicop::new(BicopFamily::Clayton, 45, &[1.0]).is_err());
    assert!(Bicop::new(BicopFamily::Gumbel, 0, &[0.5]).is_err());
    assert!(Bicop::new(BicopFamily::Student, 0, &[0.5]).is_err());

    let bicop = Bicop::default();
    assert!(matches!(
      bicop.pdf(array![[0.5, 0.5, 0.5]].view()),
      Err(VineError::DimensionMismatch(_))
    ));
    assert!(matches!(
      bicop.pdf(array![[0.5, 1.5]].view()),
      Err(VineError::Validation(_))
    ));
    assert!(matches!(bicop.get_loglik(), Err(VineError::NotFitted(_))));
  }

  #[traced_test]
  #[test]
  fn degenerate_parameters_are_reported() {
    // rho = 1 lies outside the admissible range and gives 0 / 0 on the diagonal
    let bicop = Bicop {
      family: BicopFamily::Gaussian,
      parameters: vec![1.0],
      ..Default::default()
    };
    let u = array![[0.3, 0.3], [0.2, 0.7]];
    assert!(matches!(bicop.hfunc1(u.view()), Err(VineError::Estimation(_))));
    assert!(matches!(bicop.pdf(u.view()), Err(VineError::Estimation(_))));

    let h = bicop.hfunc1_raw(u.view());
    assert_eq!(h[0], 0.5);
    assert!(logs_contain("non-finite hfunc1 values replaced"));
    assert_eq!(bicop.pdf_raw(u.view())[0], 0.0);
    assert!(logs_contain("non-finite pdf values replaced"));
  }

  #[test]
  fn independence_is_flat() {
    let bicop = Bicop::default();
    let u = grid();
    assert!(bicop.pdf(u.view()).unwrap().iter().all(|&x| x == 1.0));
    let h = bicop.hfunc1(u.view()).unwrap();
    for (a, b) in h.iter().zip(u.column(1).iter()) {
      assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }
    assert_eq!(bicop.get_npars(), 0.0);
    assert_eq!(bicop.to_string(), "Independence");
  }

  #[test]
  fn fit_recovers_parameters() {
    let truth = Bicop::new(BicopFamily::Gumbel, 0, &[2.0]).unwrap();
    let data = truth.simulate(2000, false, &[11]);

    for method in [ParametricMethod::Mle, ParametricMethod::Itau] {
      let controls = FitControlsBicop {
        parametric_method: method,
        ..Default::default()
      };
      let mut fitted = Bicop::from_family(BicopFamily::Gumbel);
      fitted.fit(data.view(), &controls).unwrap();
      assert_abs_diff_eq!(fitted.get_parameters()[0], 2.0, epsilon = 0.2);
      assert_eq!(fitted.get_nobs(), 2000);
      assert!(fitted.get_loglik().unwrap() > 0.0);
    }
  }

  #[test]
  fn itau_profiles_student_degrees_of_freedom() {
    let truth = Bicop::new(BicopFamily::Student, 0, &[0.7, 4.0]).unwrap();
    let data = truth.simulate(1500, false, &[5]);
    let controls = FitControlsBicop {
      parametric_method: ParametricMethod::Itau,
      ..Default::default()
    };
    let mut fitted = Bicop::from_family(BicopFamily::Student);
    fitted.fit(data.view(), &controls).unwrap();
    let par = fitted.get_parameters();
    assert_abs_diff_eq!(par[0], 0.7, epsilon = 0.06);
    assert!(par[1] > 2.0 && par[1] < 12.0, "nu = {}", par[1]);
  }

  #[test]
  fn itau_rejects_wrong_sign() {
    let truth = Bicop::new(BicopFamily::Clayton, 0, &[3.0]).unwrap();
    let data = truth.simulate(300, false, &[2]);
    let controls = FitControlsBicop {
      parametric_method: ParametricMethod::Itau,
      ..Default::default()
    };
    let mut fitted = Bicop::new(BicopFamily::Clayton, 90, &[1.0]).unwrap();
    assert!(matches!(
      fitted.fit(data.view(), &controls),
      Err(VineError::Compatibility(_))
    ));
  }

  #[test]
  fn simulation_reproduces_tau() {
    let bicop = Bicop::new(BicopFamily::Frank, 0, &[-6.0]).unwrap();
    let u = bicop.simulate(3000, true, &[3]);
    let tau = kendall_tau(u.column(0), u.column(1));
    assert_abs_diff_eq!(tau, bicop.get_tau(), epsilon = 0.03);
    assert!(u.slice(s![.., 1]).iter().all(|&x| x > 0.0 && x < 1.0));
  }
}
