//! Knowledge base — the immutable topic corpus retrieval scores against.
//!
//! Built once at process start (from the built-in corpus or a configured
//! override) and shared read-only behind an `Arc` for the process lifetime.

use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

/// One topic entry: keyword triggers plus the passage returned on a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub topic: String,
    pub keywords: Vec<String>,
    pub content: String,
}

/// An ordered, immutable set of [`KnowledgeItem`]s.
///
/// Declaration order matters: retrieval ties go to the earlier item.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    items: Vec<KnowledgeItem>,
}

impl KnowledgeBase {
    /// Build a knowledge base, validating every item.
    ///
    /// Keywords are lowercased so they can match a lowercased query.
    pub fn new(items: Vec<KnowledgeItem>) -> Result<Self> {
        let mut items = items;
        for (i, item) in items.iter_mut().enumerate() {
            if item.keywords.is_empty() {
                return Err(Error::Config {
                    message: format!("knowledge item #{i} ('{}') has no keywords", item.topic),
                });
            }
            if item.keywords.iter().any(|k| k.is_empty()) {
                return Err(Error::Config {
                    message: format!("knowledge item #{i} ('{}') has an empty keyword", item.topic),
                });
            }
            for keyword in item.keywords.iter_mut() {
                *keyword = keyword.to_lowercase();
            }
        }
        Ok(Self { items })
    }

    /// The built-in corpus covering generative AI and RAG topics.
    pub fn builtin() -> Self {
        let items = BUILTIN_CORPUS
            .iter()
            .map(|(topic, keywords, content)| KnowledgeItem {
                topic: (*topic).to_string(),
                keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
                content: (*content).to_string(),
            })
            .collect();
        Self { items }
    }

    pub fn items(&self) -> &[KnowledgeItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KnowledgeItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::builtin()
    }
}

// (topic, keywords, content); keywords stored lowercase.
const BUILTIN_CORPUS: &[(&str, &[&str], &str)] = &[
    (
        "Generative AI",
        &["generative ai", "genai", "ai generation", "new content"],
        "Generative AI refers to artificial intelligence systems capable of generating new content, such as text, images, audio, or video. Large Language Models (LLMs) are a prime example of generative AI, trained on vast datasets to understand and produce human-like language.",
    ),
    (
        "RAG (Retrieval-Augmented Generation)",
        &["rag", "retrieval augmented generation", "retrieval", "augmentation"],
        "RAG combines the strengths of retrieval-based and generative AI models. It works by first retrieving relevant information from a knowledge base based on a user query, and then using that retrieved context to augment the prompt given to a generative model (like an LLM). This helps reduce hallucinations and grounds responses in factual data.",
    ),
    (
        "Prompt Engineering",
        &["prompt engineering", "prompts", "crafting prompts", "guide llms"],
        "Prompt engineering is the art and science of crafting effective inputs (prompts) for AI models, especially LLMs, to guide them towards generating desired outputs. It involves techniques like defining roles, setting constraints, providing examples (few-shot learning), and specifying output formats.",
    ),
    (
        "Vector Databases",
        &["vector databases", "vector db", "embeddings", "similarity search"],
        "Vector databases are specialized databases designed to store, manage, and query high-dimensional vector embeddings. They enable efficient similarity searches, allowing systems like RAG to quickly find semantically similar documents or data points based on their vector representations.",
    ),
    (
        "Chunking Strategies",
        &["chunking", "text splitting", "document chunks", "segmenting"],
        "Chunking strategies involve breaking down large documents or texts into smaller, manageable segments (chunks) before they are embedded and stored in a vector database. Effective chunking is crucial for RAG, as it ensures that relevant information can be retrieved efficiently without overwhelming the LLM with too much context.",
    ),
    (
        "Llama 3",
        &["llama 3", "meta ai", "open-source llm"],
        "Llama 3 is a family of large language models developed by Meta AI. It is an open-source model designed for various natural language processing tasks, known for its strong performance across benchmarks. It can be used for text generation, summarization, question answering, and more.",
    ),
    (
        "Streamlit Deployment",
        &["streamlit", "deployment", "web app", "python ui"],
        "Streamlit is an open-source Python library that simplifies the creation of custom web applications for machine learning and data science. It allows developers to quickly build interactive UIs with minimal code, making it an ideal tool for deploying AI prototypes and demos.",
    ),
    (
        "Evaluation Metrics (General)",
        &["evaluation", "metrics", "arize ai", "performance assessment"],
        "Evaluating AI models and systems involves using various metrics to assess their performance. For RAG systems, key metrics include context relevance (how well retrieved info matches query), answer faithfulness (is answer supported by context), and answer relevance (is answer relevant to query). Tools like Arize AI help automate this process.",
    ),
    (
        "AI Clone Purpose",
        &["ai clone", "chatbot purpose", "intelligent interaction"],
        "An 'AI Clone' in this context refers to a sophisticated GenAI chatbot capable of providing informed and contextually relevant responses by leveraging external knowledge, mimicking intelligent interaction over a specific body of information. It's built using RAG to ground responses in facts.",
    ),
];
