use std::env;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use serde::Deserialize;
use thiserror::Error;

use screen_translate_capture::{Backend, Configuration, FrameSourceConfig};
use screen_translate_comparator::{ComparatorKind, ComparatorSettings};
use screen_translate_translator::ChatTranslatorConfig;
use screen_translate_types::LanguageHint;

use crate::cli::{CliArgs, CliSources};

const PROJECT_CONFIG_FILE: &str = "screen-translate.toml";
const DEFAULT_LABEL_TTL_MS: u64 = 5_000;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    backend: Option<String>,
    input: Option<String>,
    language: Option<String>,
    scan: ScanFileConfig,
    translator: TranslatorFileConfig,
    detector: DetectorFileConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScanFileConfig {
    interval_ms: Option<u64>,
    similarity_threshold: Option<f32>,
    sample_stride: Option<usize>,
    comparator: Option<String>,
    luma_delta: Option<u8>,
    settle_ms: Option<u64>,
    frame_timeout_ms: Option<u64>,
    indicator_ms: Option<u64>,
    label_ttl_ms: Option<u64>,
    concurrency: Option<usize>,
    preprocess: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TranslatorFileConfig {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    target_language: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetectorFileConfig {
    regions: Option<String>,
}

/// Snapshot of the `SCRTR_*` environment overrides.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub backend: Option<String>,
    pub input: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl EnvOverrides {
    pub fn from_process() -> Self {
        Self {
            backend: env::var("SCRTR_BACKEND").ok(),
            input: env::var("SCRTR_INPUT").ok(),
            api_key: env::var("SCRTR_API_KEY").ok(),
            base_url: env::var("SCRTR_BASE_URL").ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub interval: Option<Duration>,
    pub similarity_threshold: f32,
    pub comparator: ComparatorSettings,
    pub indicator: Duration,
    pub label_ttl: Option<Duration>,
    pub concurrency: NonZeroUsize,
    pub preprocess: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            interval: None,
            similarity_threshold: 0.9,
            comparator: ComparatorSettings::default(),
            indicator: Duration::ZERO,
            label_ttl: Some(Duration::from_millis(DEFAULT_LABEL_TTL_MS)),
            concurrency: NonZeroUsize::MIN,
            preprocess: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub capture: Configuration,
    pub language: LanguageHint,
    pub scan: ScanSettings,
    pub translator: ChatTranslatorConfig,
    pub regions: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for '{field}'{}", location(.path))]
    InvalidValue {
        path: Option<PathBuf>,
        field: &'static str,
        value: String,
    },
    #[error("config file {} does not exist", .path.display())]
    NotFound { path: PathBuf },
}

fn location(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

pub fn resolve_settings(
    cli: &CliArgs,
    sources: &CliSources,
) -> Result<EffectiveSettings, ConfigError> {
    let (file, config_path) = load_config(cli.config.as_deref())?;
    merge(cli, sources, file, config_path, &EnvOverrides::from_process())
}

fn load_config(path_override: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = path_override {
        let path = expand_pathbuf(path.to_path_buf());
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        return read_config(path);
    }

    let candidates = [project_config_path(), default_config_path()];
    for path in candidates.into_iter().flatten() {
        if path.exists() {
            return read_config(path);
        }
    }
    Ok((FileConfig::default(), None))
}

fn read_config(path: PathBuf) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    Ok((config, Some(path)))
}

fn merge(
    cli: &CliArgs,
    sources: &CliSources,
    file: FileConfig,
    config_path: Option<PathBuf>,
    env: &EnvOverrides,
) -> Result<EffectiveSettings, ConfigError> {
    let config_dir = config_path
        .as_ref()
        .and_then(|path| path.parent().map(|dir| dir.to_path_buf()));
    let invalid = |field: &'static str, value: String, from_file: bool| ConfigError::InvalidValue {
        path: if from_file { config_path.clone() } else { None },
        field,
        value,
    };

    let FileConfig {
        backend: file_backend,
        input: file_input,
        language: file_language,
        scan: file_scan,
        translator: file_translator,
        detector: file_detector,
    } = file;

    // Capture backend and input: CLI > env > file.
    let input = cli
        .input
        .clone()
        .map(expand_pathbuf)
        .or_else(|| normalize_string(env.input.clone()).map(|value| expand_home_path(&value)))
        .or_else(|| {
            normalize_string(file_input)
                .and_then(|value| resolve_path_from_config(value, config_dir.as_deref()))
        });

    let backend = match (
        normalize_string(cli.backend.clone()),
        normalize_string(env.backend.clone()),
        normalize_string(file_backend),
    ) {
        (Some(value), _, _) | (None, Some(value), _) => {
            Some(Backend::from_str(&value).map_err(|_| invalid("backend", value, false))?)
        }
        (None, None, Some(value)) => {
            Some(Backend::from_str(&value).map_err(|_| invalid("backend", value, true))?)
        }
        (None, None, None) => None,
    };
    let backend = match backend {
        Some(backend) => backend,
        None if input.is_some() && Configuration::available_backends().contains(&Backend::Still) => {
            Backend::Still
        }
        None => Backend::Synthetic,
    };

    let language = match (normalize_string(cli.language.clone()), normalize_string(file_language)) {
        (Some(value), _) => {
            LanguageHint::from_str(&value).map_err(|_| invalid("language", value, false))?
        }
        (None, Some(value)) => {
            LanguageHint::from_str(&value).map_err(|_| invalid("language", value, true))?
        }
        (None, None) => LanguageHint::default(),
    };

    let mut frame = FrameSourceConfig::default();
    if let Some(ms) = file_scan.settle_ms {
        frame.settle = Duration::from_millis(ms);
    }
    if let Some(ms) = file_scan.frame_timeout_ms {
        frame.timeout = Duration::from_millis(ms);
    }

    let capture = Configuration {
        backend,
        input,
        frame,
        ..Configuration::default()
    };

    let scan = merge_scan(cli, sources, file_scan, &invalid)?;
    let translator = merge_translator(file_translator, env, &invalid)?;

    let regions = cli.regions.clone().map(expand_pathbuf).or_else(|| {
        normalize_string(file_detector.regions)
            .and_then(|value| resolve_path_from_config(value, config_dir.as_deref()))
    });

    Ok(EffectiveSettings {
        capture,
        language,
        scan,
        translator,
        regions,
        config_path,
    })
}

#[cfg(test)]
pub(crate) fn merge_for_tests(cli: &CliArgs, sources: &CliSources) -> EffectiveSettings {
    match merge(cli, sources, FileConfig::default(), None, &EnvOverrides::default()) {
        Ok(settings) => settings,
        Err(err) => panic!("cli-only settings failed to merge: {err}"),
    }
}

fn merge_scan(
    cli: &CliArgs,
    sources: &CliSources,
    file: ScanFileConfig,
    invalid: &impl Fn(&'static str, String, bool) -> ConfigError,
) -> Result<ScanSettings, ConfigError> {
    let mut scan = ScanSettings::default();

    scan.interval = cli
        .interval_ms
        .or(file.interval_ms.filter(|ms| *ms > 0))
        .map(Duration::from_millis);

    let (threshold, from_file) = match file.similarity_threshold {
        Some(value) if !sources.threshold_from_cli => (value, true),
        _ => (cli.threshold, false),
    };
    if !(0.0..=1.0).contains(&threshold) {
        return Err(invalid(
            "similarity_threshold",
            threshold.to_string(),
            from_file,
        ));
    }
    scan.similarity_threshold = threshold;

    if let Some(value) = normalize_string(file.comparator) {
        scan.comparator.kind =
            ComparatorKind::from_str(&value).map_err(|_| invalid("comparator", value, true))?;
    }
    if let Some(stride) = file.sample_stride {
        if stride == 0 {
            return Err(invalid("sample_stride", stride.to_string(), true));
        }
        scan.comparator.stride = stride;
    }
    if let Some(delta) = file.luma_delta {
        scan.comparator.luma_delta = delta;
    }

    if let Some(ms) = file.indicator_ms {
        scan.indicator = Duration::from_millis(ms);
    }
    if let Some(ms) = file.label_ttl_ms {
        scan.label_ttl = (ms > 0).then(|| Duration::from_millis(ms));
    }

    scan.concurrency = match file.concurrency {
        Some(value) if !sources.concurrency_from_cli => NonZeroUsize::new(value)
            .ok_or_else(|| invalid("concurrency", value.to_string(), true))?,
        _ => NonZeroUsize::new(cli.concurrency as usize)
            .ok_or_else(|| invalid("concurrency", cli.concurrency.to_string(), false))?,
    };

    if let Some(preprocess) = file.preprocess {
        scan.preprocess = preprocess;
    }
    Ok(scan)
}

fn merge_translator(
    file: TranslatorFileConfig,
    env: &EnvOverrides,
    invalid: &impl Fn(&'static str, String, bool) -> ConfigError,
) -> Result<ChatTranslatorConfig, ConfigError> {
    let mut config = ChatTranslatorConfig::default();
    if let Some(base_url) =
        normalize_string(env.base_url.clone()).or_else(|| normalize_string(file.base_url))
    {
        config.base_url = base_url;
    }
    if let Some(api_key) =
        normalize_string(env.api_key.clone()).or_else(|| normalize_string(file.api_key))
    {
        config.api_key = api_key;
    }
    if let Some(model) = normalize_string(file.model) {
        config.model = model;
    }
    if let Some(target) = normalize_string(file.target_language) {
        config.target_language = target;
    }
    if let Some(secs) = file.timeout_secs {
        if secs == 0 {
            return Err(invalid("timeout_secs", secs.to_string(), true));
        }
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(temperature) = file.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(invalid("temperature", temperature.to_string(), true));
        }
        config.temperature = temperature;
    }
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("rs", "screen-translate", "screen-translate")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    env::current_dir()
        .ok()
        .map(|dir| dir.join(PROJECT_CONFIG_FILE))
}

fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn expand_pathbuf(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(s) => expand_home_path(s),
        None => path,
    }
}

fn resolve_path_from_config(value: String, base: Option<&Path>) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let expanded = expand_home_path(trimmed);
    match base {
        Some(base) if !expanded.is_absolute() => Some(base.join(expanded)),
        _ => Some(expanded),
    }
}

fn expand_home_path(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().to_path_buf();
        }
    } else if let Some(stripped) = value.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(stripped);
        }
    }
    PathBuf::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};
    use std::io::Write;

    fn cli(args: &[&str]) -> (CliArgs, CliSources) {
        let mut argv = vec!["screen-translate"];
        argv.extend_from_slice(args);
        let matches = CliArgs::command().try_get_matches_from(argv).unwrap();
        let parsed = CliArgs::from_arg_matches(&matches).unwrap();
        (parsed, CliSources::from_matches(&matches))
    }

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    fn resolve(args: &[&str], env: &EnvOverrides) -> Result<EffectiveSettings, ConfigError> {
        let (args, sources) = cli(args);
        let (file, path) = load_config(args.config.as_deref())?;
        merge(&args, &sources, file, path, env)
    }

    #[test]
    fn defaults_without_config() {
        let (args, sources) = cli(&[]);
        let settings = merge(
            &args,
            &sources,
            FileConfig::default(),
            None,
            &EnvOverrides::default(),
        )
        .unwrap();

        assert_eq!(settings.capture.backend, Backend::Synthetic);
        assert_eq!(settings.language, LanguageHint::Japanese);
        assert_eq!(settings.scan, ScanSettings::default());
        assert_eq!(settings.translator, ChatTranslatorConfig::default());
        assert!(settings.regions.is_none());
        assert!(settings.config_path.is_none());
    }

    #[test]
    fn file_values_apply_and_paths_resolve_against_config_dir() {
        let (dir, path) = write_config(
            r#"
            language = "ko"

            [scan]
            similarity_threshold = 0.8
            sample_stride = 4
            comparator = "luma"
            settle_ms = 20
            label_ttl_ms = 0
            concurrency = 3

            [translator]
            api_key = "file-key"
            model = "local-model"
            timeout_secs = 5

            [detector]
            regions = "regions.json"
            "#,
        );
        let path_arg = path.to_str().unwrap();
        let settings = resolve(&["--config", path_arg], &EnvOverrides::default()).unwrap();

        assert_eq!(settings.language, LanguageHint::Korean);
        assert_eq!(settings.scan.similarity_threshold, 0.8);
        assert_eq!(settings.scan.comparator.stride, 4);
        assert_eq!(settings.scan.comparator.kind, ComparatorKind::SampledLuma);
        assert_eq!(settings.scan.label_ttl, None);
        assert_eq!(settings.scan.concurrency.get(), 3);
        assert_eq!(settings.capture.frame.settle, Duration::from_millis(20));
        assert_eq!(settings.translator.api_key, "file-key");
        assert_eq!(settings.translator.model, "local-model");
        assert_eq!(settings.translator.timeout, Duration::from_secs(5));
        assert_eq!(settings.regions, Some(dir.path().join("regions.json")));
        assert_eq!(settings.config_path, Some(path));
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let (_dir, path) = write_config(
            r#"
            backend = "synthetic"
            [scan]
            similarity_threshold = 0.5
            concurrency = 2
            [translator]
            api_key = "file-key"
            base_url = "http://file.invalid/v1"
            "#,
        );
        let env = EnvOverrides {
            backend: Some("still".into()),
            api_key: Some("env-key".into()),
            ..EnvOverrides::default()
        };
        let path_arg = path.to_str().unwrap();

        let settings = resolve(
            &["--config", path_arg, "--threshold", "0.95", "--backend", "synthetic"],
            &env,
        )
        .unwrap();
        assert_eq!(settings.capture.backend, Backend::Synthetic);
        assert_eq!(settings.scan.similarity_threshold, 0.95);
        assert_eq!(settings.scan.concurrency.get(), 2);
        assert_eq!(settings.translator.api_key, "env-key");
        assert_eq!(settings.translator.base_url, "http://file.invalid/v1");

        let settings = resolve(&["--config", path_arg], &env).unwrap();
        assert_eq!(settings.capture.backend, Backend::Still);
        assert_eq!(settings.scan.similarity_threshold, 0.5);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let (_dir, path) = write_config("[scan]\nsimilarity_threshold = 1.5\n");
        let err = resolve(&["--config", path.to_str().unwrap()], &EnvOverrides::default())
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { field, path: Some(_), .. } => {
                assert_eq!(field, "similarity_threshold")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_language_and_comparator_are_rejected() {
        let err = resolve(&["--language", "fr"], &EnvOverrides::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { field: "language", path: None, .. }
        ));

        let (_dir, path) = write_config("[scan]\ncomparator = \"dssim\"\n");
        let err = resolve(&["--config", path.to_str().unwrap()], &EnvOverrides::default())
            .unwrap_err();
        assert!(err.to_string().contains("comparator"));
    }

    #[test]
    fn missing_and_malformed_files_report_their_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = resolve(&["--config", missing.to_str().unwrap()], &EnvOverrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));

        let (_dir, path) = write_config("[scan\n");
        let err = resolve(&["--config", path.to_str().unwrap()], &EnvOverrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }
}
