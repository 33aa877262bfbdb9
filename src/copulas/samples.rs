//! # Samples
//!
//! $$
//! x_i^{(k)}=\sum_{j\ge0}\frac{\left(a_j^{(k)}(i)+s_j^{(k)}\right)\bmod b_k}{b_k^{\,j+1}},\qquad
//! i=\sum_{j\ge0}a_j^{(k)}(i)\,b_k^{\,j}
//! $$
//!
//! Independent uniform draws, pseudo-random or randomized (generalized) Halton.
use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rand_distr::Uniform;

use super::empirical::trim_unit;

/// Number of digits scrambled per coordinate; enough for f64 resolution in base 2.
const HALTON_DIGITS: usize = 53;

/// A generator seeded from `seeds`, or from entropy when `seeds` is empty.
pub fn rng_from_seeds(seeds: &[u64]) -> StdRng {
  if seeds.is_empty() {
    return StdRng::from_entropy();
  }

  let seed = seeds.iter().fold(0x9E37_79B9_7F4A_7C15u64, |acc, &s| {
    // splitmix64 step so that (1, 2) and (2, 1) give different streams
    let mut z = acc.rotate_left(17) ^ s.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
  });
  StdRng::seed_from_u64(seed)
}

/// The first `d` primes.
pub fn primes(d: usize) -> Vec<u64> {
  let mut out = Vec::with_capacity(d);
  let mut candidate = 2u64;
  while out.len() < d {
    if out.iter().take_while(|&&p| p * p <= candidate).all(|&p| candidate % p != 0) {
      out.push(candidate);
    }
    candidate += 1;
  }
  out
}

/// `n x d` randomized Halton points: the radical inverse in the first `d` prime
/// bases with a random digit shift per (coordinate, digit).
pub fn ghalton(n: usize, d: usize, seeds: &[u64]) -> Array2<f64> {
  let mut rng = rng_from_seeds(seeds);
  let bases = primes(d);
  let shifts: Vec<Vec<u64>> = bases
    .iter()
    .map(|&b| (0..HALTON_DIGITS).map(|_| rng.gen_range(0..b)).collect())
    .collect();

  let mut out = Array2::<f64>::zeros((n, d));
  for i in 0..n {
    for (k, &b) in bases.iter().enumerate() {
      let mut index = i as u64;
      let mut scale = 1.0 / b as f64;
      let mut x = 0.0;
      for shift in shifts[k].iter() {
        if scale < f64::EPSILON * 1e-3 {
          break;
        }
        let digit = (index % b + shift) % b;
        x += digit as f64 * scale;
        index /= b;
        scale /= b as f64;
      }
      out[[i, k]] = trim_unit(x);
    }
  }

  out
}

/// `n x d` independent uniforms. With `qrng` the rows form a randomized Halton
/// sequence instead of pseudo-random draws.
pub fn simulate_uniform(n: usize, d: usize, qrng: bool, seeds: &[u64]) -> Array2<f64> {
  if qrng {
    return ghalton(n, d, seeds);
  }

  let mut rng = rng_from_seeds(seeds);
  Array2::random_using((n, d), Uniform::new(0.0, 1.0), &mut rng).mapv(trim_unit)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn first_primes() {
    assert_eq!(primes(8), vec![2, 3, 5, 7, 11, 13, 17, 19]);
  }

  #[test]
  fn seeded_draws_are_reproducible() {
    let a = simulate_uniform(20, 3, false, &[1, 2, 3]);
    let b = simulate_uniform(20, 3, false, &[1, 2, 3]);
    let c = simulate_uniform(20, 3, false, &[3, 2, 1]);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.iter().all(|&x| x > 0.0 && x < 1.0));
  }

  #[test]
  fn halton_fills_the_cube_evenly() {
    let u = ghalton(1024, 4, &[42]);
    for col in u.columns() {
      assert_abs_diff_eq!(col.mean().unwrap(), 0.5, epsilon = 0.01);
      // every one of 8 equal bins receives roughly 1024 / 8 points
      let mut bins = [0usize; 8];
      for &x in col.iter() {
        bins[((x * 8.0) as usize).min(7)] += 1;
      }
      assert!(bins.iter().all(|&c| (118..=138).contains(&c)), "{bins:?}");
    }
  }

  #[test]
  fn halton_is_seeded() {
    assert_eq!(ghalton(50, 2, &[7]), ghalton(50, 2, &[7]));
    assert_ne!(ghalton(50, 2, &[7]), ghalton(50, 2, &[8]));
  }
}
