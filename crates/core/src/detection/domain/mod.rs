pub mod cascade_classifier;
pub mod rect_grouping;
