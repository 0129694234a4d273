pub(crate) mod connect;
pub(crate) mod force_refresh;
