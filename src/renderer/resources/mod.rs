//! "Resources" refers to middle-level objects created by "Core" objects.
//! They are relatively intuitive and managed by the user.

pub mod buffer;
pub mod image;
pub mod mesh;
pub mod model;
pub mod shader;
pub mod uniform;
pub mod vertex;
