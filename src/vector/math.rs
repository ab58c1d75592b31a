//! Vector math operations for Vec3
//! Provides methods for vector norms, normalization and the dot product.

use super::Vec3;

impl Vec3 {
    /// Calculates the squared magnitude (length) of the vector.
    ///
    /// This is more efficient than `norm()` as it avoids the square root
    /// operation. Use this when you only need to compare magnitudes, which is
    /// the common case in overlap and approach tests.
    ///
    /// # Examples
    /// ```
    /// # use edmd_lib::vector::Vec3;
    /// let v = Vec3::new(3.0, 4.0, 0.0);
    /// assert_eq!(v.norm_squared(), 25.0);
    /// ```
    #[inline]
    pub fn norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Calculates the magnitude (length) of the vector.
    ///
    /// Returns the Euclidean norm: √(x² + y² + z²)
    ///
    /// # Examples
    /// ```
    /// # use edmd_lib::vector::Vec3;
    /// let v = Vec3::new(3.0, 4.0, 0.0);
    /// assert_eq!(v.norm(), 5.0);
    /// ```
    #[inline]
    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }

    /// Returns a unit vector in the same direction as this vector.
    ///
    /// If the vector has zero or near-zero magnitude (within floating-point
    /// epsilon), returns the zero vector to avoid division by zero and
    /// numerical instability.
    ///
    /// # Examples
    /// ```
    /// # use edmd_lib::vector::Vec3;
    /// let v = Vec3::new(3.0, 4.0, 0.0);
    /// assert!((v.normalize().norm() - 1.0).abs() < f64::EPSILON);
    /// assert_eq!(Vec3::zero().normalize(), Vec3::zero());
    /// ```
    pub fn normalize(&self) -> Self {
        let norm_sq = self.norm_squared();
        if norm_sq > f64::EPSILON * f64::EPSILON {
            let inv_norm = norm_sq.sqrt().recip();
            Vec3 {
                x: self.x * inv_norm,
                y: self.y * inv_norm,
                z: self.z * inv_norm,
            }
        } else {
            Vec3::zero()
        }
    }

    /// Calculates the dot product with another vector.
    ///
    /// The dot product of the separation and relative velocity of a particle
    /// pair decides whether the pair is approaching, which gates every
    /// collision prediction.
    ///
    /// # Examples
    /// ```
    /// # use edmd_lib::vector::Vec3;
    /// let a = Vec3::new(1.0, 2.0, 3.0);
    /// let b = Vec3::new(4.0, -5.0, 6.0);
    /// assert_eq!(a.dot(&b), 12.0);
    /// ```
    #[inline]
    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }
}
