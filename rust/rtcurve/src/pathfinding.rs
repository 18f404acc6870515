use crate::Point;

/// Heaviest path through `nodes` in which both coordinates strictly increase.
///
/// Nodes form a DAG ordered by `(x, y)`. Every node may start a path, and the edge
/// from `j` to `i` is worth `w_i * w_j / dist(i, j)`, which favours dense runs of
/// close, heavy cells over long jumps.
pub(crate) fn ascending_path(nodes: &mut [Point]) -> Vec<Point> {
    if nodes.is_empty() {
        return Vec::new();
    }
    nodes.sort_by(|a, b| a.x.total_cmp(&b.x).then_with(|| a.y.total_cmp(&b.y)));

    let n = nodes.len();
    let mut best: Vec<f64> = nodes.iter().map(|p| p.weight).collect();
    let mut previous: Vec<Option<usize>> = vec![None; n];

    for i in 0..n {
        for j in 0..i {
            let (a, b) = (&nodes[j], &nodes[i]);
            if b.x <= a.x || b.y <= a.y {
                continue;
            }
            let dist = (b.x - a.x).hypot(b.y - a.y);
            if dist <= 1e-6 {
                continue;
            }
            let candidate = best[j] + (a.weight * b.weight) / dist;
            if candidate > best[i] {
                best[i] = candidate;
                previous[i] = Some(j);
            }
        }
    }

    let mut end = 0;
    for i in 1..n {
        if best[i] > best[end] {
            end = i;
        }
    }

    let mut path = Vec::new();
    let mut cursor = Some(end);
    while let Some(i) = cursor {
        path.push(nodes[i]);
        cursor = previous[i];
    }
    path.reverse();
    path
}
