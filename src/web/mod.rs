//! C9 HTTP Surface: `/chat`, `/getprofs`, `/getcourses` (spec.md §6). All
//! other glue (CORS, gzip, CLI argument parsing for the scraper, the web
//! catalog HTML structure) is out of scope (spec.md §1).

mod chat;
mod courses;
mod profs;
pub mod routes;
