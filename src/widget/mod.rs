pub mod lightbox;
pub mod link_list;
