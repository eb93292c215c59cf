//! 模块源
//!
//! 模块源负责提供 `(清单, 句柄)` 对，编排引擎不关心它们从哪里来。
//!
//! - [`StaticModuleSource`] - 内存中的静态列表
//! - [`ManifestFileSource`] - 从 YAML/JSON 清单文件读取，由工厂函数为每个清单创建句柄

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::handle::ModuleHandle;
use super::metadata::ModuleManifest;
use crate::utils::{CoreError, Result};

/// 一次注册所需的清单与句柄
pub type ModuleRegistration = (ModuleManifest, Arc<dyn ModuleHandle>);

/// 句柄工厂
pub type HandleFactory = Arc<dyn Fn(&ModuleManifest) -> Arc<dyn ModuleHandle> + Send + Sync>;

/// 模块源接口
pub trait ModuleSource: Send + Sync {
    /// 产出全部待注册的模块
    fn modules(&self) -> Result<Vec<ModuleRegistration>>;
}

/// 静态模块源
#[derive(Default, Clone)]
pub struct StaticModuleSource {
    entries: Vec<ModuleRegistration>,
}

impl StaticModuleSource {
    /// 创建空的模块源
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加模块
    pub fn with_module(mut self, manifest: ModuleManifest, handle: Arc<dyn ModuleHandle>) -> Self {
        self.push(manifest, handle);
        self
    }

    /// 添加模块
    pub fn push(&mut self, manifest: ModuleManifest, handle: Arc<dyn ModuleHandle>) {
        self.entries.push((manifest, handle));
    }

    /// 模块数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ModuleSource for StaticModuleSource {
    fn modules(&self) -> Result<Vec<ModuleRegistration>> {
        Ok(self.entries.clone())
    }
}

impl fmt::Debug for StaticModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.entries.iter().map(|(m, _)| m.name.as_str()).collect();
        f.debug_struct("StaticModuleSource")
            .field("modules", &names)
            .finish()
    }
}

/// 清单文件的两种写法：顶层列表，或 `modules:` 下的列表
#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    List(Vec<ModuleManifest>),
    Wrapped { modules: Vec<ModuleManifest> },
}

impl ManifestFile {
    fn into_manifests(self) -> Vec<ModuleManifest> {
        match self {
            ManifestFile::List(list) => list,
            ManifestFile::Wrapped { modules } => modules,
        }
    }
}

/// 从清单文件读取的模块源
///
/// 文件扩展名为 `.json` 时按 JSON 解析，否则按 YAML 解析。
///
/// ```yaml
/// modules:
///   - name: db
///     priority: 10
///     is_critical: true
///   - name: api
///     dependencies: [db]
/// ```
#[derive(Clone)]
pub struct ManifestFileSource {
    path: PathBuf,
    factory: HandleFactory,
}

impl ManifestFileSource {
    /// 使用自定义工厂创建模块源
    pub fn new<F>(path: impl Into<PathBuf>, factory: F) -> Self
    where
        F: Fn(&ModuleManifest) -> Arc<dyn ModuleHandle> + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            factory: Arc::new(factory),
        }
    }

    /// 为每个清单绑定 [`PassiveModule`] 的模块源
    pub fn passive(path: impl Into<PathBuf>) -> Self {
        Self::new(path, |_| Arc::new(PassiveModule))
    }

    /// 清单文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 只读取清单，不创建句柄
    pub fn load_manifests(&self) -> Result<Vec<ModuleManifest>> {
        load_manifests(&self.path)
    }
}

impl ModuleSource for ManifestFileSource {
    fn modules(&self) -> Result<Vec<ModuleRegistration>> {
        let manifests = self.load_manifests()?;
        info!(path = %self.path.display(), count = manifests.len(), "已读取模块清单文件");

        Ok(manifests
            .into_iter()
            .map(|manifest| {
                let handle = (self.factory)(&manifest);
                (manifest, handle)
            })
            .collect())
    }
}

impl fmt::Debug for ManifestFileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestFileSource")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// 从文件读取模块清单列表
pub fn load_manifests(path: &Path) -> Result<Vec<ModuleManifest>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CoreError::ConfigLoadFailed(format!("无法读取清单文件 {}: {}", path.display(), e))
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let file: ManifestFile = if is_json {
        serde_json::from_str(&content)
            .map_err(|e| CoreError::InvalidManifest(format!("{}: {}", path.display(), e)))?
    } else {
        serde_yaml::from_str(&content)
            .map_err(|e| CoreError::InvalidManifest(format!("{}: {}", path.display(), e)))?
    };

    Ok(file.into_manifests())
}

/// 不做任何事的模块句柄
///
/// 适用于只关心依赖顺序的场景（命令行演练、测试）。
#[derive(Debug, Default, Clone, Copy)]
pub struct PassiveModule;

#[async_trait]
impl ModuleHandle for PassiveModule {
    async fn start(&self, _token: CancellationToken) -> anyhow::Result<()> {
        debug!("被动模块启动");
        Ok(())
    }

    async fn stop(&self, _token: CancellationToken) -> anyhow::Result<()> {
        debug!("被动模块停止");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_static_source() {
        let source = StaticModuleSource::new()
            .with_module(ModuleManifest::new("a"), Arc::new(PassiveModule))
            .with_module(ModuleManifest::new("b").depends_on("a"), Arc::new(PassiveModule));

        let modules = source.modules().unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[1].0.dependencies, vec!["a"]);
    }

    #[test]
    fn test_yaml_manifest_file() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(
            file,
            "modules:\n  - name: db\n    priority: 10\n  - name: api\n    dependencies: [db]"
        )
        .unwrap();

        let source = ManifestFileSource::passive(file.path());
        let modules = source.modules().unwrap();

        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].0.name, "db");
        assert_eq!(modules[0].0.priority, 10);
        assert_eq!(modules[1].0.dependencies, vec!["db"]);
    }

    #[test]
    fn test_json_manifest_list() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(file, r#"[{{"name": "cache", "is_critical": true}}]"#).unwrap();

        let manifests = load_manifests(file.path()).unwrap();
        assert_eq!(manifests.len(), 1);
        assert!(manifests[0].is_critical);
    }

    #[test]
    fn test_factory_sees_each_manifest() {
        let mut file = NamedTempFile::with_suffix(".yml").unwrap();
        writeln!(file, "- name: one\n- name: two").unwrap();

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_by_factory = seen.clone();
        let source = ManifestFileSource::new(file.path(), move |manifest| {
            seen_by_factory.lock().unwrap().push(manifest.name.clone());
            Arc::new(PassiveModule) as Arc<dyn ModuleHandle>
        });

        source.modules().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn test_missing_file() {
        let result = load_manifests(Path::new("/nonexistent/manifests.yaml"));
        assert!(matches!(result, Err(CoreError::ConfigLoadFailed(_))));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(file, "modules: 42").unwrap();

        let result = load_manifests(file.path());
        assert!(matches!(result, Err(CoreError::InvalidManifest(_))));
    }
}
