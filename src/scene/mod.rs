//! Scene graph: object lifecycle, parameter schemas, and the object kinds
//! that can be committed into a [`World`](world::World).

pub mod geometry;
pub mod group;
pub mod instance;
pub mod light;
pub mod material;
pub mod model;
pub mod object;
pub mod params;
pub mod transfer_function;
pub mod volume;
pub mod world;
