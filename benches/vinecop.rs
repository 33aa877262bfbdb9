use std::hint::black_box;
use std::time::Duration;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use vinecop_rs::Bicop;
use vinecop_rs::BicopFamily;
use vinecop_rs::FitControlsBicop;
use vinecop_rs::FitControlsVinecop;
use vinecop_rs::RVineStructure;
use vinecop_rs::TriangularArray;
use vinecop_rs::Vinecop;

fn gaussian_c_vine(d: usize) -> Vinecop {
  let order: Vec<usize> = (1..=d).collect();
  let structure = RVineStructure::c_vine(&order, usize::MAX).unwrap();
  let mut store = TriangularArray::<Bicop>::new(d);
  for t in 0..d - 1 {
    for e in 0..d - 1 - t {
      store[(t, e)] = Bicop::new(BicopFamily::Gaussian, 0, &[0.5 / (t + 1) as f64]).unwrap();
    }
  }
  Vinecop::from_structure(structure, store).unwrap()
}

fn bench_evaluation(c: &mut Criterion) {
  let mut group = c.benchmark_group("Evaluation");
  group.measurement_time(Duration::from_secs(3));
  group.warm_up_time(Duration::from_millis(500));

  for &d in &[5usize, 10usize] {
    let vine = gaussian_c_vine(d);
    let u = vine.simulate(1_000, false, 1, &[1]).unwrap();

    group.bench_with_input(BenchmarkId::new("pdf", d), &d, |b, _| {
      b.iter(|| black_box(vine.pdf(u.view(), 1).unwrap()));
    });
    group.bench_with_input(BenchmarkId::new("pdf/4_threads", d), &d, |b, _| {
      b.iter(|| black_box(vine.pdf(u.view(), 4).unwrap()));
    });
    group.bench_with_input(BenchmarkId::new("rosenblatt", d), &d, |b, _| {
      b.iter(|| black_box(vine.rosenblatt(u.view(), 1).unwrap()));
    });
    group.bench_with_input(BenchmarkId::new("simulate", d), &d, |b, _| {
      b.iter(|| black_box(vine.simulate(1_000, false, 1, &[2]).unwrap()));
    });
  }

  group.finish();
}

fn bench_selection(c: &mut Criterion) {
  let mut group = c.benchmark_group("Selection");
  group.sample_size(10);

  let vine = gaussian_c_vine(5);
  let u = vine.simulate(500, false, 1, &[3]).unwrap();
  let controls = FitControlsVinecop {
    bicop: FitControlsBicop::default().with_family_set(&[BicopFamily::Indep, BicopFamily::Gaussian, BicopFamily::Clayton]),
    ..Default::default()
  };

  for &threads in &[1usize, 4usize] {
    let mut controls = controls.clone();
    controls.bicop.num_threads = threads;
    group.bench_with_input(BenchmarkId::new("from_data", threads), &threads, |b, _| {
      b.iter(|| black_box(Vinecop::from_data(u.view(), &controls).unwrap()));
    });
  }

  group.finish();
}

criterion_group!(benches, bench_evaluation, bench_selection);
criterion_main!(benches);
