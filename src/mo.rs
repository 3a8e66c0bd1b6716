//! Multi-objective selection: fast non-dominated sorting and crowding
//! distance, generalized to any number of objectives (see DESIGN.md's
//! note on multi-objective dimensionality).

/// `a` dominates `b` iff `a` is no worse in every objective and strictly
/// better in at least one (standard Pareto dominance, minimization).
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    let mut strictly_better = false;
    for (&ai, &bi) in a.iter().zip(b.iter()) {
        if ai > bi {
            return false;
        }
        if ai < bi {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Partitions `fitnesses` into non-dominated fronts (front 0 is the Pareto
/// set). Returns, for each individual index, its front number.
pub fn fast_non_dominated_sort(fitnesses: &[Vec<f64>]) -> Vec<Vec<usize>> {
    let n = fitnesses.len();
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];
    let mut fronts: Vec<Vec<usize>> = vec![Vec::new()];

    for p in 0..n {
        for q in 0..n {
            if p == q {
                continue;
            }
            if dominates(&fitnesses[p], &fitnesses[q]) {
                dominated_by[p].push(q);
            } else if dominates(&fitnesses[q], &fitnesses[p]) {
                domination_count[p] += 1;
            }
        }
        if domination_count[p] == 0 {
            fronts[0].push(p);
        }
    }

    let mut i = 0;
    while !fronts[i].is_empty() {
        let mut next_front = Vec::new();
        for &p in &fronts[i] {
            for &q in &dominated_by[p] {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next_front.push(q);
                }
            }
        }
        i += 1;
        fronts.push(next_front);
    }
    fronts.pop(); // trailing empty front from the loop's termination check
    fronts
}

/// Crowding distance within one front (NSGA-II): for each objective, sort
/// the front by that objective and accumulate normalized neighbor gaps.
/// Boundary individuals get infinite distance.
pub fn crowding_distance(fitnesses: &[Vec<f64>], front: &[usize]) -> Vec<f64> {
    let len = front.len();
    let mut distance = vec![0.0f64; len];
    if len == 0 {
        return distance;
    }
    let n_obj = fitnesses[front[0]].len();

    for m in 0..n_obj {
        let mut order: Vec<usize> = (0..len).collect();
        order.sort_by(|&a, &b| {
            fitnesses[front[a]][m]
                .partial_cmp(&fitnesses[front[b]][m])
                .unwrap()
        });
        distance[order[0]] = f64::INFINITY;
        distance[order[len - 1]] = f64::INFINITY;
        let f_min = fitnesses[front[order[0]]][m];
        let f_max = fitnesses[front[order[len - 1]]][m];
        let span = f_max - f_min;
        if span <= 0.0 {
            continue;
        }
        for w in 1..len - 1 {
            let prev = fitnesses[front[order[w - 1]]][m];
            let next = fitnesses[front[order[w + 1]]][m];
            distance[order[w]] += (next - prev) / span;
        }
    }
    distance
}

/// Selects `n_select` indices out of `fitnesses` by filling fronts in order
/// and, for the last (partially admitted) front, sorting by descending
/// crowding distance.
pub fn select_best_n_mo(fitnesses: &[Vec<f64>], n_select: usize) -> Vec<usize> {
    let fronts = fast_non_dominated_sort(fitnesses);
    let mut selected = Vec::with_capacity(n_select);
    for front in &fronts {
        if selected.len() + front.len() <= n_select {
            selected.extend(front.iter().copied());
        } else {
            let remaining = n_select - selected.len();
            if remaining == 0 {
                break;
            }
            let distances = crowding_distance(fitnesses, front);
            let mut ranked: Vec<(usize, f64)> =
                front.iter().copied().zip(distances).collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
            selected.extend(ranked.into_iter().take(remaining).map(|(idx, _)| idx));
            break;
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominance_respects_minimization() {
        assert!(dominates(&[1.0, 2.0], &[2.0, 3.0]));
        assert!(!dominates(&[1.0, 2.0], &[1.0, 2.0]));
        assert!(!dominates(&[1.0, 3.0], &[2.0, 2.0]));
    }

    #[test]
    fn first_front_is_the_pareto_set() {
        let f = vec![
            vec![1.0, 4.0],
            vec![2.0, 2.0],
            vec![3.0, 1.0],
            vec![5.0, 5.0], // dominated by all three above
        ];
        let fronts = fast_non_dominated_sort(&f);
        assert_eq!(fronts[0].len(), 3);
        assert!(fronts[0].contains(&0));
        assert!(fronts[0].contains(&1));
        assert!(fronts[0].contains(&2));
        assert_eq!(fronts[1], vec![3]);
    }

    #[test]
    fn select_best_n_fills_fronts_then_crowding() {
        let f = vec![
            vec![1.0, 4.0],
            vec![2.0, 2.0],
            vec![3.0, 1.0],
            vec![5.0, 5.0],
        ];
        let selected = select_best_n_mo(&f, 2);
        assert_eq!(selected.len(), 2);
        // both boundary points of the Pareto front have infinite crowding
        // distance and must be preferred over the interior point.
        assert!(selected.contains(&0));
        assert!(selected.contains(&2));
    }

    #[test]
    fn n_objective_sort_beyond_two_dimensions() {
        let f = vec![
            vec![0.0, 0.0, 0.0],
            vec![1.0, 1.0, 1.0],
            vec![0.5, 0.5, 2.0],
        ];
        let fronts = fast_non_dominated_sort(&f);
        assert!(fronts[0].contains(&0));
        assert!(!fronts[0].contains(&1));
    }
}
