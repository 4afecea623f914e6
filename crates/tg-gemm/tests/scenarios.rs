//! End-to-end scenarios for the tiled GEMM: known products, degenerate
//! geometries, rejected launches, and detection of broken kernels.

use approx::assert_relative_eq;
use tg_gemm::{tile_kernel, GemmError, Matrix, TiledGemm, Verifier, TILE_A, TILE_B};
use tg_grid::{DeviceConfig, GridError, Id2, NdRange, Queue, Range2, WorkItem, WriteOnceBuffer};

fn device() -> DeviceConfig {
    DeviceConfig::default()
        .with_compute_units(4)
        .with_hazard_checks(true)
}

fn launch_tiles(
    n: usize,
    tile: usize,
    kernel: impl Fn(&WorkItem<'_, f32>, &WriteOnceBuffer<f32>) -> tg_grid::Result<()> + Sync,
) -> Result<Matrix<f32>, GridError> {
    let nd = NdRange::new(Range2::square(n), Range2::square(tile))?;
    let c = WriteOnceBuffer::new(nd.global());
    Queue::new(device()).launch::<f32, _>(
        nd,
        &[Range2::square(tile), Range2::square(tile)],
        |item| kernel(item, &c),
    )?;
    Ok(Matrix::new(c.into_vec(), n, n).expect("n x n output"))
}

// ---------------------------------------------------------------------------
// Known products
// ---------------------------------------------------------------------------

#[test]
fn identity_times_ones_is_ones() {
    let a = Matrix::<f32>::identity(4);
    let b = Matrix::<f32>::filled(4, 4, 1.0);
    let c = TiledGemm::new(Queue::new(device()), 2).multiply(&a, &b).unwrap();
    assert_eq!(c, b);
    for r in 0..4 {
        assert_eq!(c.row(r).iter().sum::<f32>(), 4.0);
    }
}

#[test]
fn single_group_covers_whole_matrix() {
    let a = Matrix::<f32>::random(8, 5);
    let b = Matrix::<f32>::random(8, 6);
    let device = device().with_compute_units(1);
    let (c, stats) = TiledGemm::new(Queue::new(device), 8)
        .multiply_with_stats(&a, &b)
        .unwrap();

    assert_eq!(stats.work_groups, 1);
    // One sweep step: a single barrier pair, then the retire barrier.
    assert_eq!(stats.barrier_phases, vec![3]);
    let report = Verifier::default().verify(&a, &b, &c).unwrap();
    assert!(report.passed(), "{}", report);
}

#[test]
fn seeded_random_product_verifies() {
    let a = Matrix::<f32>::random(128, 42);
    let b = Matrix::<f32>::random(128, 43);
    let c = TiledGemm::new(Queue::new(device()), 4).multiply(&a, &b).unwrap();
    let report = Verifier::default().verify(&a, &b, &c).unwrap();
    assert!(report.passed(), "{}", report);
}

#[test]
#[ignore = "N=1024 B=4 passes about 33.6M barrier phases, tens of minutes on one core; run with --release -- --ignored"]
fn reference_demo_size_verifies() {
    let a = Matrix::<f32>::random(1024, 42);
    let b = Matrix::<f32>::random(1024, 43);
    let device = DeviceConfig::default();
    let c = TiledGemm::new(Queue::new(device), 4).multiply(&a, &b).unwrap();
    let report = Verifier::default().verify(&a, &b, &c).unwrap();
    assert!(report.passed(), "{} mismatches", report.mismatches.len());
}

#[test]
fn double_precision_mkl_style_inputs_verify() {
    let a = Matrix::<f64>::random_in(32, 32, 1.0, 2.0, 9);
    let b = Matrix::<f64>::random_in(32, 32, 1.0, 2.0, 10);
    let c = TiledGemm::new(Queue::new(device()), 8).multiply(&a, &b).unwrap();
    let report = Verifier::default().verify(&a, &b, &c).unwrap();
    assert!(report.passed());

    // Every entry is a dot product of 32 values in [1, 4).
    for &v in c.as_slice() {
        assert!((32.0..128.0).contains(&v));
    }
    let row_sum: f64 = c.row(0).iter().sum();
    let expected: f64 = (0..32)
        .map(|k| a.get(0, k) * b.row(k).iter().sum::<f64>())
        .sum();
    assert_relative_eq!(row_sum, expected, max_relative = 1e-12);
}

// ---------------------------------------------------------------------------
// Rejected launches
// ---------------------------------------------------------------------------

#[test]
fn indivisible_size_is_rejected_before_launch() {
    let a = Matrix::<f32>::filled(6, 6, 1.0);
    let err = TiledGemm::new(Queue::new(device()), 4)
        .multiply(&a, &a)
        .unwrap_err();
    assert_eq!(
        err,
        GemmError::Grid(GridError::NotDivisible {
            global: Range2::square(6),
            local: Range2::square(4),
        })
    );
}

#[test]
fn tiles_exceeding_local_memory_are_rejected() {
    let device = device().with_local_mem_bytes(256);
    let a = Matrix::<f64>::zeros(8, 8);
    let err = TiledGemm::new(Queue::new(device), 8)
        .multiply(&a, &a)
        .unwrap_err();
    assert!(matches!(
        err,
        GemmError::Grid(GridError::LocalMemoryExceeded { requested: 1024, capacity: 256 })
    ));
}

// ---------------------------------------------------------------------------
// Broken kernels are caught
// ---------------------------------------------------------------------------

#[test]
fn off_by_one_tile_load_is_detected() {
    let n = 32;
    let tile = 4;
    let a = Matrix::<f32>::random(n, 42);
    let b = Matrix::<f32>::random(n, 43);

    let c = launch_tiles(n, tile, |item, c| {
        let Id2 { row: j, col: i } = item.global_id();
        let Id2 { row: lj, col: li } = item.local_id();
        let a_tile = item.tile(TILE_A)?;
        let b_tile = item.tile(TILE_B)?;
        let mut acc = 0.0f32;
        for kb in 0..n / tile {
            // Column index shifted by one inside the tile.
            a_tile.store(lj, li, a.get(j, kb * tile + (li + 1) % tile))?;
            b_tile.store(lj, li, b.get(kb * tile + lj, i))?;
            item.barrier()?;
            for k in 0..tile {
                acc += a_tile.load(lj, k)? * b_tile.load(k, li)?;
            }
            item.barrier()?;
        }
        c.write(Id2::new(j, i), acc)
    })
    .unwrap();

    let report = Verifier::default().verify(&a, &b, &c).unwrap();
    assert!(!report.passed());
    assert!(!report.mismatches.is_empty());
}

#[test]
fn unmodified_kernel_through_custom_launch_verifies() {
    let n = 16;
    let a = Matrix::<f32>::random(n, 1);
    let b = Matrix::<f32>::random(n, 2);
    let c = launch_tiles(n, 4, |item, c| tile_kernel(item, &a, &b, c)).unwrap();
    assert!(Verifier::default().verify(&a, &b, &c).unwrap().passed());
}

#[test]
fn missing_load_barrier_is_a_hazard() {
    let n = 8;
    let tile = 4;
    let a = Matrix::<f32>::random(n, 3);
    let b = Matrix::<f32>::random(n, 4);

    let err = launch_tiles(n, tile, |item, c| {
        let Id2 { row: j, col: i } = item.global_id();
        let Id2 { row: lj, col: li } = item.local_id();
        let a_tile = item.tile(TILE_A)?;
        let b_tile = item.tile(TILE_B)?;
        let mut acc = 0.0f32;
        for kb in 0..n / tile {
            a_tile.store(lj, li, a.get(j, kb * tile + li))?;
            b_tile.store(lj, li, b.get(kb * tile + lj, i))?;
            for k in 0..tile {
                acc += a_tile.load(lj, k)? * b_tile.load(k, li)?;
            }
            item.barrier()?;
        }
        c.write(Id2::new(j, i), acc)
    })
    .unwrap_err();
    assert!(matches!(err, GridError::LocalMemoryHazard { .. }), "{err}");
}

#[test]
fn missing_reuse_barrier_is_a_hazard() {
    let n = 8;
    let tile = 4;
    let a = Matrix::<f32>::random(n, 3);
    let b = Matrix::<f32>::random(n, 4);

    let err = launch_tiles(n, tile, |item, c| {
        let Id2 { row: j, col: i } = item.global_id();
        let Id2 { row: lj, col: li } = item.local_id();
        let a_tile = item.tile(TILE_A)?;
        let b_tile = item.tile(TILE_B)?;
        let mut acc = 0.0f32;
        for kb in 0..n / tile {
            a_tile.store(lj, li, a.get(j, kb * tile + li))?;
            b_tile.store(lj, li, b.get(kb * tile + lj, i))?;
            item.barrier()?;
            for k in 0..tile {
                acc += a_tile.load(lj, k)? * b_tile.load(k, li)?;
            }
        }
        c.write(Id2::new(j, i), acc)
    })
    .unwrap_err();
    // Depending on which work-item trips first this is either the early
    // overwrite or a peer's read of the overwritten value.
    assert!(matches!(err, GridError::LocalMemoryHazard { .. }), "{err}");
}

#[test]
fn colliding_output_index_is_a_double_write() {
    let err = launch_tiles(8, 4, |item, c| {
        // Every group writes into the first group's block.
        c.write(item.local_id(), 1.0)
    })
    .unwrap_err();
    assert!(matches!(err, GridError::DoubleWrite { .. }));
}
