use super::*;
use approx::assert_relative_eq;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;

const EXAMPLE_LABELS: [u32; 6] = [1, 1, 2, 1, 3, 2];

fn example_labels() -> Grid<u32, 2> {
    Grid::from_vec([2, 3], EXAMPLE_LABELS.to_vec()).unwrap()
}

fn random_labels(rng: &mut SmallRng, shape: [usize; 3]) -> Grid<u32, 3> {
    let len = shape.iter().product();
    // multiples of 3 leave unused ids inside 0..=max
    let data = (0..len).map(|_| rng.gen_range(0..10u32) * 3).collect();
    Grid::from_vec(shape, data).unwrap()
}

fn random_weights(rng: &mut SmallRng, shape: [usize; 3]) -> Grid<f32, 3> {
    let len = shape.iter().product();
    let data = (0..len).map(|_| rng.gen_range(0.0..1.0f32)).collect();
    Grid::from_vec(shape, data).unwrap()
}

/// Edge set found by visiting voxels in `order`, checking both neighbors per axis.
fn edges_in_visit_order(labels: &Grid<u32, 3>, order: &[usize]) -> Vec<Edge> {
    let [nx, ny, nz] = labels.shape();
    let mut set = FxHashSet::default();
    for &index in order {
        let coord = [index / (ny * nz), (index / nz) % ny, index % nz];
        let u = labels.data()[index];
        for axis in 0..3 {
            for step in [-1i64, 1] {
                let mut neighbor = coord;
                let c = coord[axis] as i64 + step;
                if c < 0 || c as usize >= [nx, ny, nz][axis] {
                    continue;
                }
                neighbor[axis] = c as usize;
                let v = *labels.get(neighbor).unwrap();
                if u != v {
                    set.insert(canonical(u, v));
                }
            }
        }
    }
    let mut edges: Vec<Edge> = set.into_iter().collect();
    edges.sort();
    edges
}

#[test]
fn edge_discovery_is_scan_order_independent() {
    let seed: u64 = rand::random();
    println!("seed: {}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    let labels = random_labels(&mut rng, [7, 5, 6]);
    let mut rag = GridRag::new();
    rag.assign_labels(labels.clone());

    let mut order: Vec<usize> = (0..labels.len()).collect();
    for _ in 0..3 {
        order.shuffle(&mut rng);
        assert_eq!(rag.edges(), edges_in_visit_order(&labels, &order).as_slice());
    }

    order.reverse();
    assert_eq!(rag.edges(), edges_in_visit_order(&labels, &order).as_slice());
}

#[test]
fn serialization_round_trip() {
    let mut rng = SmallRng::seed_from_u64(7);
    let labels = random_labels(&mut rng, [6, 6, 6]);
    let mut rag = GridRag::new();
    rag.assign_labels(labels);

    let data = rag.serialize();
    let mut restored = GridRag::<3>::new();
    restored.deserialize(&data).unwrap();

    assert_eq!(restored.node_num(), rag.node_num());
    assert_eq!(restored.edge_num(), rag.edge_num());
    assert_eq!(restored.node_ids(), rag.node_ids());
    assert_eq!(restored.edges(), rag.edges());
    assert_eq!(restored.max_node_id(), rag.max_node_id());
    assert_eq!(restored.serialize(), data);
    for &(u, v) in rag.edges() {
        assert_eq!(restored.edge_id(u, v), rag.edge_id(v, u));
        assert_eq!(restored.neighbors(u), rag.neighbors(u));
    }
}

#[test]
fn constant_weight_grid_gives_constant_edge_weights() {
    let mut rng = SmallRng::seed_from_u64(11);
    let labels = random_labels(&mut rng, [5, 8, 4]);
    let weights = Grid::filled([5, 8, 4], 0.42f32).unwrap();

    let segmentor = GridSegmentor::<3>::new();
    segmentor.preprocessing(labels, &weights).unwrap();
    let edge_weights = segmentor.edge_weights().unwrap();
    assert_eq!(edge_weights.len(), segmentor.edge_num().unwrap());
    for w in edge_weights {
        assert_relative_eq!(w, 0.42, epsilon = 1e-6);
    }
}

#[test]
fn no_foreground_seed_means_all_background() {
    let mut rng = SmallRng::seed_from_u64(3);
    for _ in 0..5 {
        let labels = random_labels(&mut rng, [4, 5, 6]);
        let weights = random_weights(&mut rng, [4, 5, 6]);
        let segmentor = GridSegmentor::<3>::new();
        segmentor.preprocessing(labels, &weights).unwrap();

        let max = segmentor.max_node_id().unwrap().unwrap();
        let background: Vec<NodeId> = (0..=max).filter(|_| rng.gen_bool(0.3)).collect();
        segmentor.set_seeds(&[], &background).unwrap();
        segmentor.run().unwrap();

        assert!(segmentor.super_voxel_seg().unwrap().iter().all(|&fg| !fg));
        let roi = Roi::full([4, 5, 6]);
        assert!(segmentor
            .segmentation(&roi)
            .unwrap()
            .data()
            .iter()
            .all(|&fg| !fg));
    }
}

#[test]
fn result_override_ignores_previous_run() {
    let segmentor = GridSegmentor::<2>::new();
    let weights = Grid::filled([2, 3], 1.0f32).unwrap();
    segmentor.preprocessing(example_labels(), &weights).unwrap();
    segmentor.set_seeds(&[1, 3], &[2]).unwrap();
    segmentor.run().unwrap();
    assert_eq!(
        segmentor.super_voxel_seg().unwrap(),
        vec![false, true, false, true]
    );

    segmentor.set_result_foreground(&[0, 2]).unwrap();
    assert_eq!(
        segmentor.super_voxel_seg().unwrap(),
        vec![true, false, true, false]
    );
    // seeds are untouched by the override
    assert_eq!(segmentor.super_voxel_seeds().unwrap(), vec![0, 1, 2, 1]);
}

#[test]
fn roi_segmentation_matches_cropped_full_segmentation() {
    let seed: u64 = rand::random();
    println!("seed: {}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    let shape = [6, 7, 5];
    let segmentor = GridSegmentor::<3>::new();
    segmentor
        .preprocessing(random_labels(&mut rng, shape), &random_weights(&mut rng, shape))
        .unwrap();
    segmentor.set_seeds(&[0, 3, 6], &[21, 27]).unwrap();
    segmentor.run().unwrap();

    let full = segmentor.segmentation(&Roi::full(shape)).unwrap();
    assert_eq!(full.shape(), shape);

    for _ in 0..20 {
        let mut begin = [0; 3];
        let mut end = [0; 3];
        for axis in 0..3 {
            begin[axis] = rng.gen_range(0..=shape[axis]);
            end[axis] = rng.gen_range(begin[axis]..=shape[axis]);
        }
        let roi = Roi::new(begin, end);
        let direct = segmentor.segmentation(&roi).unwrap();
        assert_eq!(direct, full.crop(&roi).unwrap(), "roi {:?}", roi);
    }
}

#[test]
fn worked_example_tie_goes_to_background() {
    let mut rag = GridRag::new();
    rag.assign_labels(example_labels());
    assert_eq!(rag.node_ids(), &[1, 2, 3]);
    assert_eq!(rag.edges(), &[(1, 2), (1, 3), (2, 3)]);
    let topology = rag.serialize();

    let segmentor = GridSegmentor::<2>::new();
    segmentor
        .preprocessing_from_serialization(
            example_labels(),
            &topology,
            &[10.0, 1.0, 1.0],
            &[0, 1, 2, 0],
            &[0; 4],
        )
        .unwrap();
    segmentor.run().unwrap();
    assert_eq!(
        segmentor.super_voxel_seg().unwrap(),
        vec![false, true, false, false]
    );
    let mask = segmentor.segmentation(&Roi::full([2, 3])).unwrap();
    assert_eq!(mask.data(), &[true, true, false, true, false, false]);

    // a stronger (1, 3) boundary pulls node 3 to the foreground
    segmentor
        .preprocessing_from_serialization(
            example_labels(),
            &topology,
            &[10.0, 5.0, 1.0],
            &[0, 1, 2, 0],
            &[0; 4],
        )
        .unwrap();
    segmentor.run().unwrap();
    assert_eq!(
        segmentor.super_voxel_seg().unwrap(),
        vec![false, true, false, true]
    );
}

#[test]
fn cube_splits_along_weak_plane() {
    // 4x4x4 voxels, eight 2x2x2 supervoxels labeled 1..=8
    let shape = [4, 4, 4];
    let mut labels = Vec::new();
    let mut weights = Vec::new();
    for x in 0..4 {
        for y in 0..4 {
            for z in 0..4 {
                labels.push(((x / 2) * 4 + (y / 2) * 2 + z / 2 + 1) as u8);
                weights.push(if x == 1 || x == 2 { 0.1f32 } else { 1.0 });
            }
        }
    }
    let labels = Grid::from_vec(shape, labels).unwrap();
    let weights = Grid::from_vec(shape, weights).unwrap();

    let segmentor: GridSegmentor<3, u8> = SegmentorBuilder::default().build();
    segmentor.preprocessing(labels, &weights).unwrap();
    assert_eq!(segmentor.node_num().unwrap(), 8);
    assert_eq!(segmentor.edge_num().unwrap(), 12);

    let mut brush = Grid::filled([1, 1, 1], 1u8).unwrap();
    segmentor
        .add_seeds(&brush, &Roi::new([0, 0, 0], [1, 1, 1]), 2)
        .unwrap();
    brush = Grid::filled([2, 1, 1], 2u8).unwrap();
    segmentor
        .add_seeds(&brush, &Roi::new([2, 3, 3], [4, 4, 4]), 2)
        .unwrap();
    assert_eq!(
        segmentor.super_voxel_seeds().unwrap(),
        vec![0, 1, 0, 0, 0, 0, 0, 0, 2]
    );

    segmentor.run().unwrap();
    assert_eq!(
        segmentor.super_voxel_seg().unwrap(),
        vec![false, true, true, true, true, false, false, false, false]
    );

    let mask = segmentor.segmentation(&Roi::full(shape)).unwrap();
    for x in 0..4 {
        for y in 0..4 {
            for z in 0..4 {
                assert_eq!(*mask.get([x, y, z]).unwrap(), x < 2);
            }
        }
    }
}

#[test]
fn snapshot_restores_session() {
    let mut rng = SmallRng::seed_from_u64(5);
    let shape = [5, 5, 5];
    let labels = random_labels(&mut rng, shape);

    let segmentor = GridSegmentor::<3>::new();
    segmentor
        .preprocessing(labels.clone(), &random_weights(&mut rng, shape))
        .unwrap();
    segmentor.set_seeds(&[3, 9], &[24]).unwrap();
    segmentor.run().unwrap();

    let json = segmentor.snapshot().unwrap().to_json().unwrap();
    let snapshot = SessionSnapshot::from_json(&json).unwrap();

    let restored = GridSegmentor::<3>::new();
    restored.restore(labels, &snapshot).unwrap();
    assert_eq!(restored.edge_weights().unwrap(), segmentor.edge_weights().unwrap());
    assert_eq!(
        restored.super_voxel_seeds().unwrap(),
        segmentor.super_voxel_seeds().unwrap()
    );
    assert_eq!(
        restored.super_voxel_seg().unwrap(),
        segmentor.super_voxel_seg().unwrap()
    );
    let roi = Roi::full(shape);
    assert_eq!(
        restored.segmentation(&roi).unwrap(),
        segmentor.segmentation(&roi).unwrap()
    );

    // same seeds and weights give the same cut
    restored.clear_segmentation().unwrap();
    restored.run().unwrap();
    assert_eq!(
        restored.super_voxel_seg().unwrap(),
        segmentor.super_voxel_seg().unwrap()
    );

    let mut bytes = Vec::new();
    write_topology(&mut bytes, &snapshot.topology).unwrap();
    assert_eq!(read_topology(bytes.as_slice()).unwrap(), snapshot.topology);
}

struct SeedsOnly;

impl CutSolver for SeedsOnly {
    fn solve(&self, node_count: usize, _: &[Edge], _: &[f32], seeds: &[Seed]) -> Result<Cut> {
        assert_eq!(seeds.len(), node_count);
        Ok(Cut {
            foreground: seeds.iter().map(|s| *s == Seed::Foreground).collect(),
            value: 0.0,
        })
    }
}

#[test]
fn pluggable_solver() {
    let segmentor = SegmentorBuilder::default()
        .set_aggregation(EdgeAggregation::Sum)
        .build_with_solver::<2, u32, _>(SeedsOnly);
    let weights = Grid::filled([2, 3], 1.0f32).unwrap();
    segmentor.preprocessing(example_labels(), &weights).unwrap();
    // (1, 3) is induced by two voxel pairs
    assert_eq!(segmentor.edge_weights().unwrap(), vec![1.0, 2.0, 1.0]);

    segmentor.set_seeds(&[3], &[1]).unwrap();
    segmentor.run().unwrap();
    assert_eq!(
        segmentor.super_voxel_seg().unwrap(),
        vec![false, false, false, true]
    );
}
