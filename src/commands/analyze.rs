//! Ad-hoc analysis of a single URL

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::{AnalysisFields, MetaDb};
use crate::notify::LogNotifier;
use crate::pipeline::Pipeline;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, Serialize)]
pub struct AdHocAnalysis {
    pub video_url: String,
    #[serde(flatten)]
    pub fields: AnalysisFields,
}

/// Run the stages for `url` without queueing it
pub async fn cmd_analyze(config: &Config, db: &MetaDb, url: &str) -> Result<AdHocAnalysis> {
    let parsed = Url::parse(url)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Other(format!("Not an http(s) URL: {}", url)));
    }

    let pipeline = Pipeline::from_config(config, db.clone(), Arc::new(LogNotifier))?;
    let fields = pipeline.analyze_url(parsed.as_str()).await?;

    Ok(AdHocAnalysis {
        video_url: url.to_string(),
        fields,
    })
}

pub fn print_analysis(analysis: &AdHocAnalysis) {
    let f = &analysis.fields;
    println!("\n🔎 {}\n", analysis.video_url);
    if let Some(source) = &f.sharing_url {
        println!("Source: {}", source);
    }
    if let Some(err) = &f.error_message {
        println!("✗ {}", err);
    }
    if let Some(summary) = &f.analysis_summary {
        println!("\nDigest:\n{}", summary);
    }
    if let Some(result) = &f.analysis_result {
        println!("\nAnalysis:\n{}", result);
    } else if let Some(text) = &f.extracted_text {
        println!("\nExtracted text:\n{}", text);
    }
}
