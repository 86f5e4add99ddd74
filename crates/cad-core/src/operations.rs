//! Distance combinators. Union and intersection stay exact outside the
//! result; difference is a bound.

pub fn union(a: f64, b: f64) -> f64 {
    a.min(b)
}

pub fn intersection(a: f64, b: f64) -> f64 {
    a.max(b)
}

/// `a` with `b` carved out.
pub fn difference(a: f64, b: f64) -> f64 {
    a.max(-b)
}

/// Positive `amount` grows the shape outward.
pub fn offset(distance: f64, amount: f64) -> f64 {
    distance - amount
}

/// Prism distance for a profile swept along z from 0 to `height`.
pub fn extrude(profile_distance: f64, z: f64, height: f64) -> f64 {
    let half = height / 2.0;
    let slab = (z - half).abs() - half;
    let outside = profile_distance.max(0.0).hypot(slab.max(0.0));
    outside + profile_distance.max(slab).min(0.0)
}
