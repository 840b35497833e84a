pub mod color_space;
pub mod region;
pub mod region_extractor;

pub use region::ImageRegion;
pub use region_extractor::RegionExtractor;
