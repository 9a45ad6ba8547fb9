//! 3x3 matrices for the Newton solver
//!
//! Reverse pipeline evaluation builds a Jacobian of three outputs by three
//! inputs and solves it once per iteration. All arithmetic is f64.

use std::ops::{Index, IndexMut};

/// Determinants below this are treated as singular
const SINGULAR_EPSILON: f64 = 1e-14;

/// A 3x3 matrix, row-major: `m[row][col]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3x3 {
    pub m: [[f64; 3]; 3],
}

impl Matrix3x3 {
    #[inline]
    pub const fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Returns M × v
    #[inline]
    pub fn multiply_vec(&self, v: [f64; 3]) -> [f64; 3] {
        [
            self.m[0][0] * v[0] + self.m[0][1] * v[1] + self.m[0][2] * v[2],
            self.m[1][0] * v[0] + self.m[1][1] * v[1] + self.m[1][2] * v[2],
            self.m[2][0] * v[0] + self.m[2][1] * v[1] + self.m[2][2] * v[2],
        ]
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Inverse by adjugate, or `None` when singular
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < SINGULAR_EPSILON || !det.is_finite() {
            return None;
        }

        let inv_det = 1.0 / det;
        let m = &self.m;

        Some(Self {
            m: [
                [
                    (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
                    (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
                    (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
                ],
                [
                    (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
                    (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
                    (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
                ],
                [
                    (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
                    (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
                    (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
                ],
            ],
        })
    }

    /// Solve `M × x = b`
    ///
    /// Returns `None` when the system has no unique solution.
    pub fn solve(&self, b: [f64; 3]) -> Option<[f64; 3]> {
        self.inverse().map(|inv| inv.multiply_vec(b))
    }
}

impl Default for Matrix3x3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Index<usize> for Matrix3x3 {
    type Output = [f64; 3];

    fn index(&self, row: usize) -> &Self::Output {
        &self.m[row]
    }
}

impl IndexMut<usize> for Matrix3x3 {
    fn index_mut(&mut self, row: usize) -> &mut Self::Output {
        &mut self.m[row]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    #[test]
    fn test_determinant() {
        assert!((Matrix3x3::identity().determinant() - 1.0).abs() < EPSILON);

        let a = Matrix3x3 {
            m: [[1.0, 2.0, 3.0], [0.0, 1.0, 4.0], [5.0, 6.0, 0.0]],
        };
        assert!((a.determinant() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_solve() {
        let a = Matrix3x3 {
            m: [[2.0, 0.0, 1.0], [1.0, 3.0, 0.0], [0.0, 1.0, 4.0]],
        };
        let x = [0.25, -1.5, 2.0];
        let b = a.multiply_vec(x);

        let solved = a.solve(b).unwrap();
        for i in 0..3 {
            assert!((solved[i] - x[i]).abs() < 1e-9, "component {}", i);
        }
    }

    #[test]
    fn test_singular_matrix() {
        // Row 3 = row 1 + row 2
        let singular = Matrix3x3 {
            m: [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [5.0, 7.0, 9.0]],
        };
        assert!(singular.inverse().is_none());
        assert!(singular.solve([1.0, 1.0, 1.0]).is_none());
    }

    #[test]
    fn test_index() {
        let mut a = Matrix3x3::identity();
        a[1][2] = 7.0;
        assert_eq!(a.m[1][2], 7.0);
        assert_eq!(a[0], [1.0, 0.0, 0.0]);
    }
}
