use nalgebra::Point2;
use std::collections::HashMap;
use stokes_grid::geometry::{IndexBox, IndexPosition};
use stokes_grid::grid::{box_size, iterate, GridConnectivity, Q1Connectivity, RefinedQ1Connectivity, StructuredGrid};
use util::assert_panics;

fn index_box<const D: usize>(bottom_left: [isize; D], upper_right: [isize; D]) -> IndexBox<D> {
    IndexBox::from_corners(bottom_left, upper_right)
}

fn decomposed_grid() -> StructuredGrid<f64, 2> {
    StructuredGrid::new([10, 5], [9.0, 2.0]).decompose([3, 2])
}

#[test]
fn structured_grid_spacing_and_positions() {
    let grid = StructuredGrid::new([10, 5], [9.0, 2.0]);
    assert_eq!(grid.spacing(), [1.0, 0.5]);
    assert_eq!(grid.num_nodes(), 50);
    assert_eq!(grid.num_ranks(), 1);
    assert_eq!(grid.node_box(), index_box([0, 0], [10, 5]));
    assert_eq!(grid.cell_box(), index_box([0, 0], [9, 4]));
    assert_eq!(grid.owned_nodes(0), grid.node_box());
    assert_eq!(grid.ghosted_nodes(0), grid.node_box());
    assert_eq!(grid.owned_cells(0), grid.cell_box());

    let node = IndexPosition::from([3, 2]);
    assert_eq!(grid.linear_index(&node), 23);
    assert_eq!(grid.node_position(&node), Point2::new(3.0, 1.0));
}

#[test]
fn structured_grid_rejects_invalid_input() {
    assert_panics!(StructuredGrid::new([1, 5], [1.0, 1.0]));
    assert_panics!(StructuredGrid::new([3, 5], [1.0, 0.0]));
    assert_panics!(StructuredGrid::new([3, 5], [1.0, 1.0]).decompose([0, 1]));
    assert_panics!(StructuredGrid::new([3, 5], [1.0, 1.0]).decompose([4, 1]));
    assert_panics!(decomposed_grid().owned_nodes(6));
}

#[test]
fn structured_grid_decomposition() {
    let grid = decomposed_grid();
    assert_eq!(grid.num_ranks(), 6);

    // Axis 0 is split as 4 + 3 + 3 nodes, axis 1 as 3 + 2 nodes
    assert_eq!(grid.owned_nodes(0), index_box([0, 0], [4, 3]));
    assert_eq!(grid.owned_nodes(2), index_box([7, 0], [10, 3]));
    assert_eq!(grid.owned_nodes(4), index_box([4, 3], [7, 5]));

    assert_eq!(grid.ghosted_nodes(0), index_box([0, 0], [5, 4]));
    assert_eq!(grid.ghosted_nodes(4), index_box([3, 2], [8, 5]));

    assert_eq!(grid.owned_cells(2), index_box([7, 0], [9, 3]));
    assert_eq!(grid.owned_cells(4), index_box([4, 3], [7, 4]));
}

#[test]
fn structured_grid_owned_boxes_partition_the_grid() {
    let grid = decomposed_grid();
    let mut node_owners = HashMap::new();
    let mut cell_owners = HashMap::new();
    for rank in 0..grid.num_ranks() {
        iterate(&grid.owned_nodes(rank), |node| {
            assert!(node_owners.insert(*node, rank).is_none());
        });
        iterate(&grid.owned_cells(rank), |cell| {
            assert!(cell_owners.insert(*cell, rank).is_none());
        });
    }
    assert_eq!(node_owners.len(), box_size(&grid.node_box()));
    assert_eq!(cell_owners.len(), box_size(&grid.cell_box()));
}

#[test]
fn structured_grid_refined() {
    let grid = decomposed_grid();
    let fine = grid.refined();
    assert_eq!(fine.nodes(), &[19, 9]);
    assert_eq!(fine.lengths(), grid.lengths());
    assert_eq!(fine.spacing(), [0.5, 0.25]);
    assert_eq!(fine.num_ranks(), grid.num_ranks());
    assert_eq!(fine.owned_nodes(2), index_box([14, 0], [19, 6]));
    assert_eq!(fine.owned_nodes(4), index_box([8, 6], [14, 9]));

    // Every fine cell belongs to the rank owning its coarse cell
    for rank in 0..grid.num_ranks() {
        let coarse = grid.owned_cells(rank);
        let expected = index_box(
            [2 * coarse.bottom_left[0], 2 * coarse.bottom_left[1]],
            [2 * coarse.upper_right[0], 2 * coarse.upper_right[1]],
        );
        assert_eq!(fine.owned_cells(rank), expected);
    }
}

#[test]
fn iterate_first_axis_fastest() {
    let mut visited = Vec::new();
    iterate(&index_box([1, 0], [3, 2]), |p| visited.push([p[0], p[1]]));
    assert_eq!(visited, vec![[1, 0], [2, 0], [1, 1], [2, 1]]);
}

#[test]
fn iterate_empty_and_inverted_boxes() {
    let mut count = 0;
    iterate(&index_box([1, 1], [1, 4]), |_| count += 1);
    iterate(&index_box([3, 1], [1, 4]), |_| count += 1);
    iterate(&index_box([0, 0, 5], [2, 2, 4]), |_| count += 1);
    assert_eq!(count, 0);
    assert_eq!(box_size(&index_box([3, 1], [1, 4])), 0);
}

#[test]
fn iterate_3d_visits_every_position_once() {
    let b = index_box([-1, 2, 0], [2, 4, 3]);
    let mut visited = Vec::new();
    iterate(&b, |p| visited.push(*p));
    assert_eq!(visited.len(), 18);
    assert_eq!(box_size(&b), 18);
    assert_eq!(visited.first(), Some(&IndexPosition::from([-1, 2, 0])));
    assert_eq!(visited.last(), Some(&IndexPosition::from([1, 3, 2])));
    visited.sort_by_key(|p| (p[0], p[1], p[2]));
    visited.dedup();
    assert_eq!(visited.len(), 18);
}

#[test]
fn q1_connectivity() {
    let connectivity = Q1Connectivity;
    assert_eq!(GridConnectivity::<2>::nodes_per_cell(&connectivity), 4);
    assert_eq!(GridConnectivity::<3>::nodes_per_cell(&connectivity), 8);

    let mut nodes = vec![IndexPosition::origin(); 4];
    connectivity.populate_cell_nodes(&mut nodes, &IndexPosition::from([2, 3]));
    let expected: Vec<IndexPosition<2>> = [[2, 3], [3, 3], [2, 4], [3, 4]]
        .into_iter()
        .map(IndexPosition::from)
        .collect();
    assert_eq!(nodes, expected);
}

#[test]
fn refined_q1_connectivity() {
    let connectivity = RefinedQ1Connectivity;
    assert_eq!(GridConnectivity::<2>::nodes_per_cell(&connectivity), 9);
    assert_eq!(GridConnectivity::<3>::nodes_per_cell(&connectivity), 27);

    let mut nodes = vec![IndexPosition::origin(); 9];
    connectivity.populate_cell_nodes(&mut nodes, &IndexPosition::from([1, 1]));
    let expected: Vec<IndexPosition<2>> = [[2, 2], [3, 2], [4, 2], [2, 3], [3, 3], [4, 3], [2, 4], [3, 4], [4, 4]]
        .into_iter()
        .map(IndexPosition::from)
        .collect();
    assert_eq!(nodes, expected);
}

#[test]
fn connectivity_checks_buffer_size() {
    assert_panics!({
        let mut nodes = vec![IndexPosition::<2>::origin(); 3];
        Q1Connectivity.populate_cell_nodes(&mut nodes, &IndexPosition::from([0, 0]));
    });
}
