//! Binlog Viewer Module
//!
//! Pages through `SHOW BINLOG EVENTS` output. The server owns the binary
//! log; this module only builds bounded queries over it and works out the
//! navigation links around each page.

mod pager;

pub use pager::{
    build_query, navigation, truncate_info, BinaryLog, BinlogPageRequest, BinlogPager,
    BinlogParams, BinlogView, Navigation, UrlParams,
};
