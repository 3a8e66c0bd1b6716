//! CGP topology parameters, chromosome layout and bounds.
//!
//! Node indices `0..n-1` are program inputs; functional nodes occupy
//! `n..n+F-1` laid out column-major (column 0's `r` rows first, then column
//! 1's, ...); output genes select any node index in `0..n+F-1`.
//!
//! Connection-gene bounds for a node in column `j` are
//! `[max(0, n+(j-l)*r), n+j*r-1]` once `j >= l`, else `[0, n+j*r-1]`. Output
//! genes are bound by the *same* formula evaluated at the virtual column `c`
//! (one past the last real column): the worked bounds example below shows
//! topology `(3,1,2,3,2,3)` yields an output bound of `[5, 8]`, not the
//! looser `[0, n+F-1]` a looser reading of the connection-gene rule might
//! suggest.

use crate::error::CgpError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CgpParams {
    pub n: usize,
    pub m: usize,
    pub r: usize,
    pub c: usize,
    pub l: usize,
    pub a: usize,
}

impl CgpParams {
    pub fn new(n: usize, m: usize, r: usize, c: usize, l: usize, a: usize) -> Result<Self, CgpError> {
        if n < 1 {
            return Err(CgpError::InvalidArgument("n must be >= 1".into()));
        }
        if m < 1 {
            return Err(CgpError::InvalidArgument("m must be >= 1".into()));
        }
        if r < 1 {
            return Err(CgpError::InvalidArgument("r must be >= 1".into()));
        }
        if c < 1 {
            return Err(CgpError::InvalidArgument("c must be >= 1".into()));
        }
        if a < 1 {
            return Err(CgpError::InvalidArgument("a must be >= 1".into()));
        }
        if l < 1 || l > c {
            return Err(CgpError::InvalidArgument(format!(
                "levels-back l={l} must be in [1, c={c}]"
            )));
        }
        Ok(CgpParams { n, m, r, c, l, a })
    }

    pub fn num_functional_nodes(&self) -> usize {
        self.r * self.c
    }

    /// Total number of addressable nodes (inputs + functional nodes).
    pub fn num_nodes(&self) -> usize {
        self.n + self.num_functional_nodes()
    }

    /// Length of the integer chromosome: `F*(a+1) + m`.
    pub fn chromosome_len(&self) -> usize {
        self.num_functional_nodes() * (self.a + 1) + self.m
    }

    /// Connection/output-gene bound for a (possibly virtual) column `j`.
    fn column_bound(&self, j: usize) -> (usize, usize) {
        let ub = self.n + j * self.r - 1;
        if j >= self.l {
            let lb = self.n + (j - self.l) * self.r; // j >= l so this never underflows
            (lb, ub)
        } else {
            (0, ub)
        }
    }

    /// Which column a functional node at chromosome-node-index `node_idx`
    /// (in `n..n+F-1`) lives in.
    fn column_of_node(&self, node_idx: usize) -> usize {
        (node_idx - self.n) / self.r
    }

    /// Per-gene `(lb, ub)` bounds for the entire integer chromosome, in
    /// layout order: for each functional node, `(function_gene, conn_1, ...,
    /// conn_a)`, then `m` output genes.
    pub fn bounds(&self, num_kernels: usize) -> (Vec<usize>, Vec<usize>) {
        let f = self.num_functional_nodes();
        let mut lb = Vec::with_capacity(self.chromosome_len());
        let mut ub = Vec::with_capacity(self.chromosome_len());
        for i in 0..f {
            let node_idx = self.n + i;
            let col = self.column_of_node(node_idx);
            lb.push(0);
            ub.push(num_kernels.saturating_sub(1));
            let (clb, cub) = self.column_bound(col);
            for _ in 0..self.a {
                lb.push(clb);
                ub.push(cub);
            }
        }
        let (olb, oub) = self.column_bound(self.c);
        for _ in 0..self.m {
            lb.push(olb);
            ub.push(oub);
        }
        (lb, ub)
    }

    /// Index of the first gene of functional node `i` (0-based among the `F`
    /// functional nodes) in the flat chromosome.
    pub fn node_gene_offset(&self, i: usize) -> usize {
        i * (self.a + 1)
    }

    pub fn output_gene_offset(&self, i: usize) -> usize {
        self.num_functional_nodes() * (self.a + 1) + i
    }
}

/// Reverse-BFS active-node/active-gene extraction ("Active-node set").
/// `genes` is the integer chromosome; `kernel_arity(f)` returns the number of
/// connection genes kernel index `f` actually reads.
pub struct ActiveSet {
    /// Functional-node indices (in `n..n+F-1`) reachable from some output.
    pub active_nodes: Vec<usize>,
    /// Flat chromosome positions that are active: function genes and
    /// connection genes of active nodes (up to each kernel's effective
    /// arity), plus all output genes.
    pub active_genes: Vec<usize>,
}

impl ActiveSet {
    pub fn compute(
        params: &CgpParams,
        genes: &[usize],
        kernel_arity: impl Fn(usize) -> usize,
    ) -> ActiveSet {
        let f = params.num_functional_nodes();
        let mut visited = vec![false; f];
        let mut stack: Vec<usize> = Vec::new();
        let mut active_genes = Vec::new();

        for o in 0..params.m {
            let gene_idx = params.output_gene_offset(o);
            active_genes.push(gene_idx);
            let target = genes[gene_idx];
            if target >= params.n {
                stack.push(target - params.n);
            }
        }

        let mut active_nodes = Vec::new();
        while let Some(local) = stack.pop() {
            if visited[local] {
                continue;
            }
            visited[local] = true;
            active_nodes.push(params.n + local);

            let base = params.node_gene_offset(local);
            let fgene = genes[base];
            active_genes.push(base);
            let arity = kernel_arity(fgene).min(params.a);
            for c in 0..arity {
                let conn_gene_idx = base + 1 + c;
                active_genes.push(conn_gene_idx);
                let target = genes[conn_gene_idx];
                if target >= params.n {
                    stack.push(target - params.n);
                }
            }
        }

        active_nodes.sort_unstable();
        active_genes.sort_unstable();
        active_genes.dedup();
        ActiveSet {
            active_nodes,
            active_genes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_worked_example() {
        let p = CgpParams::new(3, 1, 2, 3, 2, 3).unwrap();
        let (lb, ub) = p.bounds(4);
        assert_eq!(
            lb,
            vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 3, 3, 0, 3, 3, 3, 5]
        );
        assert_eq!(
            ub,
            vec![3, 2, 2, 2, 3, 2, 2, 2, 3, 4, 4, 4, 3, 4, 4, 4, 3, 6, 6, 6, 3, 6, 6, 6, 8]
        );
    }

    #[test]
    fn chromosome_len_matches_layout_formula() {
        let p = CgpParams::new(2, 4, 2, 3, 4, 2).unwrap();
        assert_eq!(p.chromosome_len(), p.r * p.c * (p.a + 1) + p.m);
        assert_eq!(p.chromosome_len(), 22);
    }

    #[test]
    fn rejects_bad_topology() {
        assert!(CgpParams::new(0, 1, 1, 1, 1, 1).is_err());
        assert!(CgpParams::new(1, 1, 1, 1, 2, 1).is_err()); // l > c
    }
}
