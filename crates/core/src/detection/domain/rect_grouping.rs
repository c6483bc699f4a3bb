//! Clustering of raw sliding-window hits into final detections.

use crate::shared::rect::Rect;

/// Similarity tolerance between hits of the same object.
pub const DEFAULT_GROUP_EPS: f64 = 0.2;

/// Merges overlapping raw hits into one averaged rectangle per object.
///
/// Hits whose edges all lie within `eps * (min widths + min heights) / 2`
/// of each other join the same cluster (transitively). A cluster survives
/// when it has more than `min_neighbors` members, and is then discarded if
/// it sits inside a stronger cluster. Clusters are returned in order of
/// their first member. With `min_neighbors == 0` the hits are returned
/// unchanged.
pub fn group_rectangles(hits: &[Rect], min_neighbors: u32, eps: f64) -> Vec<Rect> {
    if min_neighbors == 0 || hits.is_empty() {
        return hits.to_vec();
    }

    let (labels, n_classes) = partition(hits, eps);

    let mut sums = vec![[0i64; 4]; n_classes];
    let mut counts = vec![0u32; n_classes];
    for (hit, &label) in hits.iter().zip(&labels) {
        let sum = &mut sums[label];
        sum[0] += hit.x as i64;
        sum[1] += hit.y as i64;
        sum[2] += hit.width as i64;
        sum[3] += hit.height as i64;
        counts[label] += 1;
    }

    let averaged: Vec<Rect> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &n)| {
            let avg = |v: i64| (v as f64 / n as f64).round() as i32;
            Rect::new(avg(sum[0]), avg(sum[1]), avg(sum[2]), avg(sum[3]))
        })
        .collect();

    let strong = |i: usize| counts[i] > min_neighbors;

    (0..n_classes)
        .filter(|&i| strong(i))
        .filter(|&i| {
            !(0..n_classes).any(|j| {
                j != i && strong(j) && is_nested(&averaged[i], &averaged[j], eps) && {
                    let (n1, n2) = (counts[i], counts[j]);
                    n2 > n1.max(3) || n1 < 3
                }
            })
        })
        .map(|i| averaged[i])
        .collect()
}

fn is_nested(inner: &Rect, outer: &Rect, eps: f64) -> bool {
    let dx = (outer.width as f64 * eps).round() as i32;
    let dy = (outer.height as f64 * eps).round() as i32;
    inner.x >= outer.x - dx
        && inner.y >= outer.y - dy
        && inner.right() <= outer.right() + dx
        && inner.bottom() <= outer.bottom() + dy
}

fn similar(a: &Rect, b: &Rect, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    (a.x - b.x).abs() as f64 <= delta
        && (a.y - b.y).abs() as f64 <= delta
        && (a.right() - b.right()).abs() as f64 <= delta
        && (a.bottom() - b.bottom()).abs() as f64 <= delta
}

/// Labels every hit with its cluster, numbering clusters by first member.
fn partition(hits: &[Rect], eps: f64) -> (Vec<usize>, usize) {
    let mut parent: Vec<usize> = (0..hits.len()).collect();
    for i in 0..hits.len() {
        for j in (i + 1)..hits.len() {
            if similar(&hits[i], &hits[j], eps) {
                union(&mut parent, i, j);
            }
        }
    }

    let mut class_of_root = vec![usize::MAX; hits.len()];
    let mut n_classes = 0;
    let labels = (0..hits.len())
        .map(|i| {
            let root = find(&mut parent, i);
            if class_of_root[root] == usize::MAX {
                class_of_root[root] = n_classes;
                n_classes += 1;
            }
            class_of_root[root]
        })
        .collect();
    (labels, n_classes)
}

/// Find root of element `i` with path halving.
fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra] = rb;
    }
}
