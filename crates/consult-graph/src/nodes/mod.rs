pub mod draft_reply;
pub mod faq_search;
pub mod intent;
pub mod rag_policy;
pub mod risk;
pub mod sentiment;
pub mod summarize;
