//! Query Module
//!
//! The text query language and the equality conditions it carries.
//!
//! ## Grammar
//! ```text
//! insert users {'name': 'Ada', 'age': 36}
//! select users where "name" == "Ada"
//! update users set {"age": 37} where "id" == 1
//! delete users where "id" == 1
//! create index users by_name on name age
//! flush users
//! ```

mod condition;
mod parser;

pub use condition::{Condition, Literal};
pub use parser::parse;
