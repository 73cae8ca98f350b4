//! Minimal 3-vector helpers for the local detector frame.

/// Cartesian 3-vector, `[x, y, z]`.
pub type Vec3 = [f64; 3];

/// Dot product.
pub fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Euclidean norm.
pub fn norm(a: &Vec3) -> f64 {
    dot(a, a).sqrt()
}

/// Component-wise difference `a - b`.
pub fn sub(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Point reached from `origin` after travelling `distance` along `direction`.
pub fn advance(origin: &Vec3, direction: &Vec3, distance: f64) -> Vec3 {
    [
        origin[0] + distance * direction[0],
        origin[1] + distance * direction[1],
        origin[2] + distance * direction[2],
    ]
}

/// Reversed vector.
pub fn reversed(a: &Vec3) -> Vec3 {
    [-a[0], -a[1], -a[2]]
}

/// Unit vector along `a`, or `None` for a (numerically) null vector.
pub fn normalized(a: &Vec3) -> Option<Vec3> {
    let n = norm(a);
    if n <= f64::from(f32::EPSILON) {
        None
    } else {
        Some([a[0] / n, a[1] / n, a[2] / n])
    }
}
