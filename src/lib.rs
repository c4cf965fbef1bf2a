//! LDAP 搜索过滤器（RFC 4515 / RFC 2254）的词法分析器和容错语法分析器。
//!
//! 分析结果是保留位置信息的语法树；格式错误不会中止分析，而是以 `Error`
//! token 的形式记录在出错的节点上，适合在编辑器中每次按键后重新分析。
//!
//! ```
//! use ldap_filter_studio::parser::Parser;
//!
//! let mut parser = Parser::new();
//! let filter = parser.parse("(&(objectClass=person)(cn=John*))");
//! assert!(filter.is_well_formed());
//! assert_eq!(filter.children().len(), 2);
//! ```

pub mod config;
pub mod diagnostics;
pub mod filter;
pub mod parser;
pub mod scanner;
pub mod token;

pub use filter::{ExtensibleComponent, Filter, FilterComponent, ItemComponent, LogicalComponent};
pub use parser::Parser;
pub use scanner::Scanner;
pub use token::{Span, Token, TokenKind};
