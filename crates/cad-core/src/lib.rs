//! Signed distance geometry for the CAD pipeline: analytic primitives, 2D
//! profiles, CSG operators, transforms and the `Profile`/`Solid` trees the
//! script engine builds.

pub mod bounds;
pub mod operations;
pub mod primitives;
pub mod profiles;
pub mod shape;
pub mod transforms;

pub use bounds::Aabb;
pub use primitives::{Point3, Sdf3};
pub use profiles::{Point2, Sdf2};
pub use shape::{Axis, GeometryError, Profile, Solid};
