pub mod extend_bbox;
