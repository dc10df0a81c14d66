mod bounds;
pub use self::bounds::*;

mod color;
pub use self::color::*;

mod hexahedron;
pub use self::hexahedron::*;

mod hull;
pub use self::hull::*;

mod obb;
pub use self::obb::*;

mod point;
pub use self::point::*;
