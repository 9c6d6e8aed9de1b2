//! Downloads sample chest X-ray images and lays them out as a labelled
//! `train`/`test` tree:
//!
//! ```text
//! medical_images_test/
//! ├── train/
//! │   ├── NORMAL/
//! │   └── PNEUMONIA/
//! └── test/
//!     ├── NORMAL/
//!     └── PNEUMONIA/
//! ```

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::loader::Split;

pub const DEFAULT_BASE_DIR: &str = "medical_images_test";

const COVID_CHESTXRAY_IMAGES: &str =
    "https://raw.githubusercontent.com/ieee8023/covid-chestxray-dataset/master/images";

/// Fetches the raw bytes behind a URL.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Plain HTTP GET through a blocking `reqwest` client. Non-2xx statuses are errors.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Wraps a preconfigured client (proxy, timeouts, TLS).
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Server rejected {}", url))?;
        let bytes = response
            .bytes()
            .with_context(|| format!("Failed to read body of {}", url))?;
        Ok(bytes.to_vec())
    }
}

/// Which split(s) a downloaded image is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMode {
    /// Image `i` of a class goes to `train` when `i` is even, `test` when odd.
    #[default]
    Disjoint,
    /// Every image is written to both splits. Demonstration only: train and
    /// test then share files.
    Mirrored,
}

impl SplitMode {
    fn splits_for(self, index: usize) -> &'static [Split] {
        match self {
            Self::Mirrored => &[Split::Train, Split::Test],
            Self::Disjoint if index % 2 == 0 => &[Split::Train],
            Self::Disjoint => &[Split::Test],
        }
    }
}

/// A class name and the URLs of its images, in download order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSource {
    pub class_name: String,
    pub urls: Vec<String>,
}

impl ClassSource {
    pub fn new(class_name: impl Into<String>, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            class_name: class_name.into(),
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }
}

/// The four covid-chestxray-dataset images, two per class.
pub fn default_sources() -> Vec<ClassSource> {
    let url = |file: &str| format!("{}/{}", COVID_CHESTXRAY_IMAGES, file);
    vec![
        ClassSource::new(
            "NORMAL",
            [
                url("1-s2.0-S1684118220300608-main.pdf-001.jpg"),
                url("1-s2.0-S1684118220300608-main.pdf-002.jpg"),
            ],
        ),
        ClassSource::new(
            "PNEUMONIA",
            [
                url("covid-19-caso-70-1-PA.jpg"),
                url("covid-19-pneumonia-15-PA.jpg"),
            ],
        ),
    ]
}

/// Outcome of a provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub base_dir: PathBuf,
    pub train_images: usize,
    pub test_images: usize,
    /// URLs that could not be fetched or written anywhere.
    pub failed_urls: Vec<String>,
}

impl ProvisionReport {
    fn record(&mut self, split: Split) {
        match split {
            Split::Train => self.train_images += 1,
            Split::Test => self.test_images += 1,
        }
    }
}

/// Creates the dataset tree and fills it from remote sources.
///
/// Per-image failures are logged and skipped; only directory creation
/// failures abort. Existing files are overwritten.
///
/// # Example
/// ```ignore
/// let base = DatasetProvisioner::new()
///     .with_split_mode(SplitMode::Mirrored)
///     .setup()?;
/// ```
pub struct DatasetProvisioner {
    base_dir: PathBuf,
    split_mode: SplitMode,
    sources: Vec<ClassSource>,
    fetcher: Option<Box<dyn Fetch>>,
}

impl Default for DatasetProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetProvisioner {
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            split_mode: SplitMode::default(),
            sources: default_sources(),
            fetcher: None,
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn with_split_mode(mut self, split_mode: SplitMode) -> Self {
        self.split_mode = split_mode;
        self
    }

    pub fn with_sources(mut self, sources: Vec<ClassSource>) -> Self {
        self.sources = sources;
        self
    }

    /// Replaces the default [`HttpFetcher`].
    pub fn with_fetcher(mut self, fetcher: impl Fetch + 'static) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Provisions the tree and returns its base directory.
    pub fn setup(&self) -> Result<PathBuf> {
        Ok(self.provision()?.base_dir)
    }

    /// Provisions the tree and reports what was written.
    ///
    /// Only directory creation is fatal. If the default HTTP client cannot
    /// be built, every URL is reported as failed.
    pub fn provision(&self) -> Result<ProvisionReport> {
        self.create_dirs()?;

        let report = match &self.fetcher {
            Some(fetcher) => self.download_with(Ok(fetcher.as_ref())),
            None => match HttpFetcher::new() {
                Ok(http) => self.download_with(Ok(&http)),
                Err(e) => self.download_with(Err(e)),
            },
        };

        info!(
            base_dir = %self.base_dir.display(),
            train = report.train_images,
            test = report.test_images,
            failed = report.failed_urls.len(),
            "Dataset provisioned"
        );
        Ok(report)
    }

    fn download_with(&self, fetcher: Result<&dyn Fetch>) -> ProvisionReport {
        let mut report = ProvisionReport {
            base_dir: self.base_dir.clone(),
            ..Default::default()
        };

        let fetcher = match fetcher {
            Ok(fetcher) => fetcher,
            Err(e) => {
                error!(error = %format!("{:#}", e), "No HTTP client available, skipping downloads");
                report.failed_urls = self
                    .sources
                    .iter()
                    .flat_map(|source| source.urls.iter().cloned())
                    .collect();
                return report;
            }
        };

        for source in &self.sources {
            for (i, url) in source.urls.iter().enumerate() {
                let bytes = match fetcher.fetch(url) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(url = %url, error = %format!("{:#}", e), "Error downloading image");
                        report.failed_urls.push(url.clone());
                        continue;
                    }
                };

                let mut written = false;
                for &split in self.split_mode.splits_for(i) {
                    let save_path = self
                        .class_dir(split, &source.class_name)
                        .join(format!("image_{}.jpg", i));
                    match fs::write(&save_path, &bytes) {
                        Ok(()) => {
                            report.record(split);
                            written = true;
                        }
                        Err(e) => warn!(
                            path = %save_path.display(),
                            error = %e,
                            "Error writing image"
                        ),
                    }
                }

                if written {
                    info!("Downloaded {} image {}", source.class_name, i);
                } else {
                    report.failed_urls.push(url.clone());
                }
            }
        }
        report
    }

    fn class_dir(&self, split: Split, class_name: &str) -> PathBuf {
        self.base_dir.join(split.as_ref()).join(class_name)
    }

    fn create_dirs(&self) -> Result<()> {
        for split in [Split::Train, Split::Test] {
            for source in &self.sources {
                let dir = self.class_dir(split, &source.class_name);
                fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create directory {}", dir.display()))?;
            }
        }
        Ok(())
    }
}
