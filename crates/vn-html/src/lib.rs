//! URL rewriting for HTML fragments.

pub mod rewriter;
pub mod rules;
pub mod script;
pub mod values;

pub use rewriter::FragmentContext;
pub use rewriter::MarkupRewriter;
pub use rules::AttributeRule;
pub use rules::rule_for;
pub use script::IdentityScriptProcessor;
pub use script::ScriptProcessor;
pub use vn_dom::scan::is_raw_text_tag;
pub use vn_dom::scan::is_text_only_tag;
