pub mod entity;
pub mod gameplay;
pub mod judgment;
pub mod lane;
pub mod life;
pub mod note;
pub mod parsing;
pub mod player;
pub mod summary;
pub mod timeline;
pub mod timing;
