//! Job template rendering with fingerprint caching.
//!
//! A job renders to a single tar.gz blob holding every destination file. The
//! render fingerprint covers the job definition, the value of every property
//! path its templates reference and the key shape of its network values, so
//! unreferenced properties never invalidate a cached render.

pub mod template;

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::consts::NETWORK_ROOT;
use crate::progress::{Progress, Silent, Stage};
use crate::properties::PropertyTree;
use crate::release::Job;
use crate::store::{BlobRef, BlobStore, Index, StoreError, TemplateKey};
use crate::util::archive;
use crate::util::hash::{Fingerprint, HashError, Hashable};

use template::{Segment, TemplateError};

#[derive(Debug, Error)]
pub enum RenderError {
  #[error("failed to render template '{template}' of job '{job}': {source}")]
  Template {
    job: String,
    template: String,
    #[source]
    source: TemplateError,
  },

  #[error("failed to store rendered job '{job}': {source}")]
  Store {
    job: String,
    #[source]
    source: StoreError,
  },

  #[error("failed to pack rendered job '{job}': {source}")]
  Archive {
    job: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to compute render fingerprint: {0}")]
  Fingerprint(#[from] HashError),

  #[error("render task failed: {0}")]
  Task(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedJob {
  pub name: String,
  pub fingerprint: Fingerprint,
  pub blob: BlobRef,
  pub cached: bool,
}

/// Outcome of [`render_jobs`].
#[derive(Debug, Default, Clone, Serialize)]
pub struct RenderedTemplates {
  pub blobs: BTreeMap<String, BlobRef>,
  pub rendered: Vec<String>,
  pub cached: Vec<String>,
}

#[derive(Serialize)]
struct RenderInput<'a> {
  job: Fingerprint,
  properties: BTreeMap<String, &'a Value>,
  network_shape: Vec<String>,
}

impl Hashable for RenderInput<'_> {}

struct ParsedTemplate<'a> {
  source: &'a str,
  destination: &'a str,
  segments: Vec<Segment>,
}

/// Render every template of `job` against `properties`.
///
/// Every referenced property must resolve; nothing is stored otherwise.
pub fn render_job(
  job: &Job,
  properties: &PropertyTree,
  blobs: &BlobStore,
  index: &Index<TemplateKey>,
) -> Result<RenderedJob, RenderError> {
  render_job_reporting(job, properties, blobs, index, &Silent)
}

fn render_job_reporting(
  job: &Job,
  properties: &PropertyTree,
  blobs: &BlobStore,
  index: &Index<TemplateKey>,
  progress: &dyn Progress,
) -> Result<RenderedJob, RenderError> {
  let template_err = |template: &str, source| RenderError::Template {
    job: job.name.clone(),
    template: template.to_string(),
    source,
  };

  let mut parsed = Vec::with_capacity(job.templates.len());
  let mut referenced: BTreeMap<String, &Value> = BTreeMap::new();
  for file in &job.templates {
    let segments = template::parse(&file.content).map_err(|e| template_err(&file.source, e))?;
    for segment in &segments {
      if let Segment::Property(path) = segment {
        let value = template::lookup(properties, path).map_err(|e| template_err(&file.source, e))?;
        referenced.insert(path.clone(), value);
      }
    }
    parsed.push(ParsedTemplate {
      source: &file.source,
      destination: &file.destination,
      segments,
    });
  }

  let fingerprint = RenderInput {
    job: job.fingerprint()?,
    properties: referenced,
    network_shape: network_shape(properties),
  }
  .compute_fingerprint()?;

  let key = TemplateKey {
    name: job.name.clone(),
    fingerprint: fingerprint.clone(),
  };

  if let Some(blob) = index.lookup(&key) {
    info!(job = %job.name, fingerprint = %fingerprint, "rendered job cache hit");
    progress.cached(Stage::RenderingJobTemplates, &job.name);
    return Ok(RenderedJob {
      name: job.name.clone(),
      fingerprint,
      blob,
      cached: true,
    });
  }

  progress.started(Stage::RenderingJobTemplates, &job.name);
  let mut files = BTreeMap::new();
  for template in &parsed {
    let rendered =
      template::substitute_segments(&template.segments, properties).map_err(|e| template_err(template.source, e))?;
    debug!(job = %job.name, template = %template.source, destination = %template.destination, "rendered template");
    files.insert(template.destination.to_string(), rendered.into_bytes());
  }

  let bytes = archive::pack_files(&files, archive::template_mode).map_err(|source| RenderError::Archive {
    job: job.name.clone(),
    source,
  })?;

  let store_err = |source| RenderError::Store {
    job: job.name.clone(),
    source,
  };
  let stored = blobs.put(&bytes).map_err(store_err)?;
  let blob = index.record(key, stored.clone()).map_err(store_err)?.recorded(stored);

  info!(job = %job.name, blob = %blob.blob_id, "rendered job");
  progress.finished(Stage::RenderingJobTemplates, &job.name);
  Ok(RenderedJob {
    name: job.name.clone(),
    fingerprint,
    blob,
    cached: false,
  })
}

/// Render independent jobs concurrently on blocking tasks.
///
/// When several jobs fail, the error of the lexically first one is returned
/// after every job has finished.
pub async fn render_jobs(
  jobs: Vec<(Job, PropertyTree)>,
  blobs: &BlobStore,
  index: &Arc<Index<TemplateKey>>,
  progress: Arc<dyn Progress>,
) -> Result<RenderedTemplates, RenderError> {
  let mut join_set = JoinSet::new();
  for (job, properties) in jobs {
    let blobs = blobs.clone();
    let index = Arc::clone(index);
    let progress = Arc::clone(&progress);
    join_set.spawn_blocking(move || {
      let outcome = render_job_reporting(&job, &properties, &blobs, &index, progress.as_ref());
      if let Err(e) = &outcome {
        progress.failed(Stage::RenderingJobTemplates, &job.name, &e.to_string());
      }
      (job.name, outcome)
    });
  }

  let mut rendered: BTreeMap<String, RenderedJob> = BTreeMap::new();
  let mut failures: BTreeMap<String, RenderError> = BTreeMap::new();
  let mut task_error = None;

  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((name, Ok(job))) => {
        rendered.insert(name, job);
      }
      Ok((name, Err(e))) => {
        failures.insert(name, e);
      }
      Err(e) => task_error = Some(RenderError::Task(e.to_string())),
    }
  }

  if let Some((_, err)) = failures.into_iter().next() {
    return Err(err);
  }
  if let Some(err) = task_error {
    return Err(err);
  }

  let mut result = RenderedTemplates::default();
  for (name, job) in rendered {
    if job.cached {
      result.cached.push(name.clone());
    } else {
      result.rendered.push(name.clone());
    }
    result.blobs.insert(name, job.blob);
  }
  Ok(result)
}

fn network_shape(properties: &PropertyTree) -> Vec<String> {
  properties
    .get(NETWORK_ROOT)
    .cloned()
    .and_then(|network| PropertyTree::from_value(network).ok())
    .map(|network| network.leaf_paths())
    .unwrap_or_default()
}
