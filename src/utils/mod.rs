#[cfg(test)]
pub mod test_db;
#[cfg(test)]
pub mod test_kv_store;
#[cfg(test)]
pub mod test_login;
#[cfg(test)]
pub mod test_transport;
