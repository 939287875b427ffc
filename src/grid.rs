//! Structured grid handle, domain decomposition and traversal.
//!
//! Index boxes produced by this module are half-open: a box covers the positions
//! `bottom_left <= i < upper_right`. A node box covers grid nodes, a cell box covers cells
//! identified by their lower-left node.
use crate::geometry::{IndexBox, IndexPosition};
use nalgebra::Point;
use stokes_grid_traits::{real_from_usize, Real};

/// A uniform structured grid over the box $[0, l_1] \times \dots \times [0, l_D]$, decomposed into
/// contiguous per-rank sub-boxes of nodes.
///
/// Ranks are numbered with the first axis varying fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredGrid<T, const D: usize> {
    nodes: [usize; D],
    lengths: [T; D],
    /// Per axis, the node indices at which the ownership ranges of consecutive parts begin,
    /// followed by the number of nodes.
    splits: [Vec<usize>; D],
}

impl<T: Real, const D: usize> StructuredGrid<T, D> {
    /// A grid with `nodes[i]` nodes along axis `i`, owned by a single rank.
    ///
    /// # Panics
    ///
    /// Panics if an axis has fewer than two nodes or a length is not strictly positive.
    pub fn new(nodes: [usize; D], lengths: [T; D]) -> Self {
        assert!(nodes.iter().all(|&n| n >= 2), "Every axis needs at least two nodes");
        assert!(
            lengths.iter().all(|&l| l > T::zero()),
            "Domain lengths must be strictly positive"
        );
        Self {
            nodes,
            lengths,
            splits: nodes.map(|n| vec![0, n]),
        }
    }

    /// Splits each axis into `parts[i]` contiguous ranges of nodes.
    ///
    /// The leading `n % parts` ranges receive one extra node.
    ///
    /// # Panics
    ///
    /// Panics if a part count is zero or exceeds the number of nodes on its axis.
    pub fn decompose(self, parts: [usize; D]) -> Self {
        let splits = std::array::from_fn(|i| {
            let (n, p) = (self.nodes[i], parts[i]);
            assert!(p >= 1 && p <= n, "Invalid number of parts {p} for axis with {n} nodes");
            let mut boundaries = Vec::with_capacity(p + 1);
            let mut begin = 0;
            for k in 0..p {
                boundaries.push(begin);
                begin += n / p + usize::from(k < n % p);
            }
            boundaries.push(n);
            boundaries
        });
        Self { splits, ..self }
    }

    /// The grid with every cell split in two along each axis, i.e. `2 (n - 1) + 1` nodes per axis.
    ///
    /// The refined grid has the same number of ranks, and every fine cell is owned by the rank
    /// that owns the coarse cell containing it.
    pub fn refined(&self) -> Self {
        let nodes = self.nodes.map(|n| 2 * (n - 1) + 1);
        let splits = std::array::from_fn(|i| {
            self.splits[i]
                .iter()
                .map(|&b| usize::min(2 * b, nodes[i]))
                .collect()
        });
        Self {
            nodes,
            lengths: self.lengths,
            splits,
        }
    }

    pub fn nodes(&self) -> &[usize; D] {
        &self.nodes
    }

    pub fn lengths(&self) -> &[T; D] {
        &self.lengths
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.iter().product()
    }

    /// Per-axis spacing $h_i = l_i / (n_i - 1)$.
    pub fn spacing(&self) -> [T; D] {
        std::array::from_fn(|i| self.lengths[i] / real_from_usize::<T>(self.nodes[i] - 1))
    }

    /// Physical coordinates of a node.
    pub fn node_position(&self, node: &IndexPosition<D>) -> Point<T, D> {
        let h = self.spacing();
        Point::from(std::array::from_fn(|i| {
            real_from_usize::<T>(node[i] as usize) * h[i]
        }))
    }

    pub fn num_ranks(&self) -> usize {
        self.splits.iter().map(|s| s.len() - 1).product()
    }

    /// The part index along every axis of the given rank.
    fn part_of_rank(&self, rank: usize) -> [usize; D] {
        assert!(rank < self.num_ranks(), "Rank {rank} out of bounds");
        let mut remainder = rank;
        std::array::from_fn(|i| {
            let parts = self.splits[i].len() - 1;
            let part = remainder % parts;
            remainder /= parts;
            part
        })
    }

    /// All nodes of the grid.
    pub fn node_box(&self) -> IndexBox<D> {
        IndexBox::from_corners([0; D], self.nodes.map(|n| n as isize))
    }

    /// All cells of the grid.
    pub fn cell_box(&self) -> IndexBox<D> {
        IndexBox::from_corners([0; D], self.nodes.map(|n| n as isize - 1))
    }

    /// Nodes owned by `rank`.
    ///
    /// # Panics
    ///
    /// Panics if the rank is out of bounds.
    pub fn owned_nodes(&self, rank: usize) -> IndexBox<D> {
        let part = self.part_of_rank(rank);
        IndexBox::from_corners(
            std::array::from_fn(|i| self.splits[i][part[i]] as isize),
            std::array::from_fn(|i| self.splits[i][part[i] + 1] as isize),
        )
    }

    /// Owned nodes of `rank` grown by one node on every side, clipped to the grid.
    pub fn ghosted_nodes(&self, rank: usize) -> IndexBox<D> {
        let owned = self.owned_nodes(rank);
        IndexBox::from_corners(
            std::array::from_fn(|i| isize::max(owned.bottom_left[i] - 1, 0)),
            std::array::from_fn(|i| isize::min(owned.upper_right[i] + 1, self.nodes[i] as isize)),
        )
    }

    /// Cells whose lower-left node is owned by `rank`.
    ///
    /// Every cell of the grid is owned by exactly one rank.
    pub fn owned_cells(&self, rank: usize) -> IndexBox<D> {
        let owned = self.owned_nodes(rank);
        IndexBox::from_corners(
            std::array::from_fn(|i| owned.bottom_left[i]),
            std::array::from_fn(|i| isize::min(owned.upper_right[i], self.nodes[i] as isize - 1)),
        )
    }

    /// Linear index of a node in natural ordering (first axis varying fastest).
    pub fn linear_index(&self, node: &IndexPosition<D>) -> usize {
        let mut index = 0;
        for i in (0..D).rev() {
            debug_assert!(node[i] >= 0 && (node[i] as usize) < self.nodes[i]);
            index = index * self.nodes[i] + node[i] as usize;
        }
        index
    }
}

/// Visits every position of the half-open index box, with the first axis varying fastest.
///
/// Empty or inverted boxes visit nothing.
pub fn iterate<const D: usize>(index_box: &IndexBox<D>, mut f: impl FnMut(&IndexPosition<D>)) {
    let (bl, ur) = (&index_box.bottom_left, &index_box.upper_right);
    if D == 0 || (0..D).any(|i| bl[i] >= ur[i]) {
        return;
    }

    let mut current = *bl;
    loop {
        f(&current);
        let mut axis = 0;
        loop {
            current[axis] += 1;
            if current[axis] < ur[axis] {
                break;
            }
            current[axis] = bl[axis];
            axis += 1;
            if axis == D {
                return;
            }
        }
    }
}

/// The number of positions visited by [`iterate`] for the given box.
pub fn box_size<const D: usize>(index_box: &IndexBox<D>) -> usize {
    (0..D)
        .map(|i| (index_box.upper_right[i] - index_box.bottom_left[i]).max(0) as usize)
        .product()
}

/// Maps a cell to the nodes carrying its basis functions.
pub trait GridConnectivity<const D: usize> {
    fn nodes_per_cell(&self) -> usize;

    /// Writes the nodes of `cell` into `output`, in local basis function order.
    ///
    /// # Panics
    ///
    /// Panics if `output.len() != self.nodes_per_cell()`.
    fn populate_cell_nodes(&self, output: &mut [IndexPosition<D>], cell: &IndexPosition<D>);
}

/// The $2^D$ corner nodes of a cell, `cell + offset` with `offset` in $\\{0, 1\\}^D$.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Q1Connectivity;

/// The $3^D$ fine nodes covered by a coarse cell, `2 cell + offset` with `offset` in $\\{0, 1, 2\\}^D$.
///
/// Connects a cell of a pressure grid with the nodes of its [refined](StructuredGrid::refined)
/// velocity grid.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RefinedQ1Connectivity;

impl<const D: usize> GridConnectivity<D> for Q1Connectivity {
    fn nodes_per_cell(&self) -> usize {
        1 << D
    }

    fn populate_cell_nodes(&self, output: &mut [IndexPosition<D>], cell: &IndexPosition<D>) {
        assert_eq!(output.len(), GridConnectivity::<D>::nodes_per_cell(self));
        for (k, node) in output.iter_mut().enumerate() {
            *node = IndexPosition::from(std::array::from_fn(|d| cell[d] + ((k >> d) & 1) as isize));
        }
    }
}

impl<const D: usize> GridConnectivity<D> for RefinedQ1Connectivity {
    fn nodes_per_cell(&self) -> usize {
        3usize.pow(D as u32)
    }

    fn populate_cell_nodes(&self, output: &mut [IndexPosition<D>], cell: &IndexPosition<D>) {
        assert_eq!(output.len(), GridConnectivity::<D>::nodes_per_cell(self));
        for (k, node) in output.iter_mut().enumerate() {
            let mut remainder = k;
            *node = IndexPosition::from(std::array::from_fn(|d| {
                let offset = remainder % 3;
                remainder /= 3;
                2 * cell[d] + offset as isize
            }));
        }
    }
}
