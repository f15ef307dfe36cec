//! Integration tests for cloudmirror-disk
//!
//! Uses wiremock to simulate the disk REST API and verifies end-to-end
//! behavior of listing, directory creation, uploads, and deletes through
//! the `IRemoteStore` implementation.


mod test_directories;
mod test_upload;
