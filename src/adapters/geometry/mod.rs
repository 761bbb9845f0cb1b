pub mod naca;

pub use naca::NacaGeometryGenerator;
