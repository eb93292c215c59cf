//! 模块依赖管理
//!
//! 本模块提供模块依赖关系的图结构和解析器。
//!
//! # 主要组件
//!
//! - [`DependencyGraph`] - 依赖关系图，按模块名维护正向/反向邻接表
//! - [`DependencyResolver`] - 依赖解析器，负责注册清单、校验依赖、计算启动/停止顺序
//!
//! # 示例
//!
//! ```rust
//! use chips_orchestrator::module::dependency::DependencyResolver;
//! use chips_orchestrator::module::metadata::ModuleManifest;
//!
//! let mut resolver = DependencyResolver::new();
//! resolver.register_module(ModuleManifest::new("c").depends_on("a").depends_on("b")).unwrap();
//! resolver.register_module(ModuleManifest::new("b").depends_on("a")).unwrap();
//! resolver.register_module(ModuleManifest::new("a")).unwrap();
//!
//! assert!(resolver.validate_dependencies().is_valid);
//! assert_eq!(resolver.get_startup_order().unwrap(), vec!["a", "b", "c"]);
//! assert_eq!(resolver.get_shutdown_order().unwrap(), vec!["c", "b", "a"]);
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::module::metadata::ModuleManifest;
use crate::utils::{CoreError, Result};

/// 模块依赖关系图
///
/// 只保存按名称索引的邻接表，不持有模块对象本身。
/// 边 `a -> b` 表示 `a` 依赖 `b`。
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// 正向边：模块名 -> 该模块声明的依赖
    edges: HashMap<String, Vec<String>>,
    /// 反向边：模块名 -> 声明依赖它的模块
    reverse_edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// 创建一个空的依赖图
    pub fn new() -> Self {
        Self {
            edges: HashMap::new(),
            reverse_edges: HashMap::new(),
        }
    }

    /// 添加模块节点到图中
    ///
    /// 如果模块已存在，则不会重复添加。
    pub fn add_module(&mut self, module: &str) {
        self.edges.entry(module.to_string()).or_default();
        self.reverse_edges.entry(module.to_string()).or_default();
    }

    /// 添加依赖关系
    ///
    /// 表示 `module` 依赖于 `dependency`，两个节点不存在时自动添加。
    ///
    /// ```rust
    /// use chips_orchestrator::module::dependency::DependencyGraph;
    ///
    /// let mut graph = DependencyGraph::new();
    /// graph.add_dependency("api", "db");
    ///
    /// assert_eq!(graph.get_dependencies("api"), vec!["db".to_string()]);
    /// assert_eq!(graph.get_dependents("db"), vec!["api".to_string()]);
    /// ```
    pub fn add_dependency(&mut self, module: &str, dependency: &str) {
        self.add_module(module);
        self.add_module(dependency);

        let deps = self.edges.entry(module.to_string()).or_default();
        if !deps.iter().any(|d| d == dependency) {
            deps.push(dependency.to_string());
        }

        let rev_deps = self.reverse_edges.entry(dependency.to_string()).or_default();
        if !rev_deps.iter().any(|d| d == module) {
            rev_deps.push(module.to_string());
        }
    }

    /// 替换模块的全部出边
    ///
    /// 重新注册同名模块时使用：保留指向该模块的入边，只重建它自己声明的依赖。
    pub fn set_dependencies(&mut self, module: &str, dependencies: &[String]) {
        self.add_module(module);

        let old = self.edges.insert(module.to_string(), Vec::new()).unwrap_or_default();
        for dep in old {
            if let Some(rev_deps) = self.reverse_edges.get_mut(&dep) {
                rev_deps.retain(|d| d != module);
            }
        }

        for dep in dependencies {
            self.add_dependency(module, dep);
        }
    }

    /// 移除依赖关系
    pub fn remove_dependency(&mut self, module: &str, dependency: &str) {
        if let Some(deps) = self.edges.get_mut(module) {
            deps.retain(|d| d != dependency);
        }
        if let Some(rev_deps) = self.reverse_edges.get_mut(dependency) {
            rev_deps.retain(|d| d != module);
        }
    }

    /// 获取模块的直接依赖（声明顺序）
    pub fn get_dependencies(&self, module: &str) -> Vec<String> {
        self.edges.get(module).cloned().unwrap_or_default()
    }

    /// 获取直接依赖该模块的模块
    pub fn get_dependents(&self, module: &str) -> Vec<String> {
        self.reverse_edges.get(module).cloned().unwrap_or_default()
    }

    /// 清空依赖图
    pub fn clear(&mut self) {
        self.edges.clear();
        self.reverse_edges.clear();
    }

    /// 检查图是否为空
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// 获取图中节点数量（包括仅作为依赖出现的节点）
    pub fn module_count(&self) -> usize {
        self.edges.len()
    }

    /// 检查是否包含指定节点
    pub fn contains_module(&self, module: &str) -> bool {
        self.edges.contains_key(module)
    }
}

/// 缺失的依赖
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MissingDependency {
    /// 声明依赖的模块
    pub module: String,
    /// 未注册的依赖名称
    pub dependency: String,
}

/// 循环依赖路径
///
/// `path` 首尾相同，例如 `["x", "y", "x"]`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DependencyCycle {
    /// 构成环的模块路径
    pub path: Vec<String>,
}

impl DependencyCycle {
    /// 环中涉及的模块（不含闭合的重复节点）
    pub fn modules(&self) -> &[String] {
        match self.path.split_last() {
            Some((_, rest)) if !rest.is_empty() => rest,
            _ => &self.path,
        }
    }

    /// 环中是否包含指定模块
    pub fn contains(&self, module: &str) -> bool {
        self.path.iter().any(|m| m == module)
    }
}

impl fmt::Display for DependencyCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.join(" -> "))
    }
}

/// 互相冲突的模块对
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConflictingModules {
    /// 声明冲突的模块
    pub module: String,
    /// 与之冲突且已注册的模块
    pub conflicts_with: String,
}

/// 依赖校验结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// 无缺失依赖且无环
    pub is_valid: bool,
    /// 缺失依赖列表
    pub missing: Vec<MissingDependency>,
    /// 循环依赖列表
    pub cycles: Vec<DependencyCycle>,
    /// 冲突声明（仅告警，不影响 `is_valid`）
    pub conflicts: Vec<ConflictingModules>,
}

impl ValidationResult {
    /// 将缺陷转换为错误列表
    pub fn errors(&self) -> Vec<CoreError> {
        let missing = self.missing.iter().map(|m| CoreError::MissingDependency {
            module: m.module.clone(),
            dependency: m.dependency.clone(),
        });
        let cycles = self.cycles.iter().map(|c| CoreError::CircularDependency {
            cycle: c.path.clone(),
        });
        missing.chain(cycles).collect()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid {
            return write!(f, "依赖关系有效");
        }

        let mut parts = Vec::new();
        for m in &self.missing {
            parts.push(format!("'{}' 缺少依赖 '{}'", m.module, m.dependency));
        }
        for c in &self.cycles {
            parts.push(format!("循环依赖 {}", c));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// 依赖解析器
///
/// 持有所有已注册的模块清单，按需从清单推导依赖图。
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    /// 已注册的清单：模块名 -> 清单
    manifests: HashMap<String, Arc<ModuleManifest>>,
    /// 硬依赖图
    graph: DependencyGraph,
}

impl DependencyResolver {
    /// 创建空的解析器
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册模块清单
    ///
    /// 同名清单会被替换（记录警告）。此处不检查依赖是否存在。
    ///
    /// # 错误
    ///
    /// 清单名称为空时返回 `CoreError::InvalidManifest`。
    pub fn register_module(&mut self, manifest: ModuleManifest) -> Result<Arc<ModuleManifest>> {
        let manifest = Arc::new(manifest);
        self.register_shared(manifest.clone())?;
        Ok(manifest)
    }

    /// 注册已共享的模块清单，返回被替换的旧清单
    pub fn register_shared(
        &mut self,
        manifest: Arc<ModuleManifest>,
    ) -> Result<Option<Arc<ModuleManifest>>> {
        if let Err(errors) = manifest.validate() {
            return Err(CoreError::InvalidManifest(errors.join("; ")));
        }

        let name = manifest.name.clone();
        self.graph.set_dependencies(&name, &manifest.dependencies);
        let previous = self.manifests.insert(name.clone(), manifest);

        if previous.is_some() {
            warn!(module = %name, "模块重复注册，旧清单已被替换");
        } else {
            debug!(module = %name, "模块清单已注册");
        }

        Ok(previous)
    }

    /// 是否已注册
    pub fn contains(&self, name: &str) -> bool {
        self.manifests.contains_key(name)
    }

    /// 获取模块清单
    pub fn manifest(&self, name: &str) -> Option<Arc<ModuleManifest>> {
        self.manifests.get(name).cloned()
    }

    /// 已注册模块名（按名称排序）
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.manifests.keys().cloned().collect();
        names.sort();
        names
    }

    /// 已注册模块数量
    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    /// 是否没有注册任何模块
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// 底层依赖图
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    // ==================== 校验 ====================

    /// 校验依赖关系
    ///
    /// 报告所有缺失依赖和所有循环（含完整路径），以及冲突声明。
    /// 不修改任何状态，可重复调用。
    pub fn validate_dependencies(&self) -> ValidationResult {
        let names = self.module_names();

        let mut missing = Vec::new();
        for name in &names {
            for dep in self.graph.get_dependencies(name) {
                if !self.contains(&dep) {
                    missing.push(MissingDependency {
                        module: name.clone(),
                        dependency: dep,
                    });
                }
            }
        }

        let cycles = self.find_cycles(&names);
        let conflicts = self.find_conflicts(&names);

        let is_valid = missing.is_empty() && cycles.is_empty();
        debug!(
            is_valid,
            missing = missing.len(),
            cycles = cycles.len(),
            conflicts = conflicts.len(),
            "依赖校验完成"
        );

        ValidationResult {
            is_valid,
            missing,
            cycles,
            conflicts,
        }
    }

    /// 在硬依赖子图上做 DFS，每条回边对应一个环
    fn find_cycles(&self, names: &[String]) -> Vec<DependencyCycle> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut cycles = Vec::new();

        for name in names {
            self.find_cycles_util(
                name,
                &mut visited,
                &mut rec_stack,
                &mut path,
                &mut seen,
                &mut cycles,
            );
        }

        cycles
    }

    fn find_cycles_util(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
        seen: &mut HashSet<Vec<String>>,
        cycles: &mut Vec<DependencyCycle>,
    ) {
        if rec_stack.contains(node) {
            if let Some(start) = path.iter().position(|n| n == node) {
                let cycle = normalize_cycle(&path[start..]);
                if seen.insert(cycle.clone()) {
                    cycles.push(DependencyCycle { path: cycle });
                }
            }
            return;
        }

        if visited.contains(node) {
            return;
        }

        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        for dep in self.graph.get_dependencies(node) {
            // 缺失的依赖不参与环检测
            if self.contains(&dep) {
                self.find_cycles_util(&dep, visited, rec_stack, path, seen, cycles);
            }
        }

        path.pop();
        rec_stack.remove(node);
    }

    fn find_conflicts(&self, names: &[String]) -> Vec<ConflictingModules> {
        let mut pairs = HashSet::new();
        let mut conflicts = Vec::new();

        for name in names {
            let Some(manifest) = self.manifests.get(name) else {
                continue;
            };
            for other in &manifest.conflicts_with {
                if other == name || !self.contains(other) {
                    continue;
                }
                let key = if name < other {
                    (name.clone(), other.clone())
                } else {
                    (other.clone(), name.clone())
                };
                if pairs.insert(key) {
                    conflicts.push(ConflictingModules {
                        module: name.clone(),
                        conflicts_with: other.clone(),
                    });
                }
            }
        }

        conflicts
    }

    // ==================== 排序 ====================

    /// 计算启动顺序
    ///
    /// 依赖在前、依赖方在后；拓扑关系无法区分的模块按 `priority` 升序、再按名称升序。
    ///
    /// # 错误
    ///
    /// 依赖校验失败时返回 `CoreError::ValidationFailed`，携带完整缺陷列表。
    pub fn get_startup_order(&self) -> Result<Vec<String>> {
        let validation = self.validate_dependencies();
        if !validation.is_valid {
            return Err(CoreError::ValidationFailed(Box::new(validation)));
        }

        let names = self.module_names();
        let edges = self.ordering_edges(&names);

        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for name in &names {
            let deps = edges.get(name.as_str()).map(Vec::as_slice).unwrap_or_default();
            in_degree.insert(name.as_str(), deps.len());
            for dep in deps {
                dependents.entry(*dep).or_default().push(name.as_str());
            }
        }

        let mut ready: BinaryHeap<Reverse<(i32, &str)>> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(name, _)| Reverse((self.priority_of(name), *name)))
            .collect();

        let mut order = Vec::with_capacity(names.len());
        while let Some(Reverse((_, name))) = ready.pop() {
            order.push(name.to_string());

            for dependent in dependents.get(name).map(Vec::as_slice).unwrap_or_default() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((self.priority_of(dependent), *dependent)));
                    }
                }
            }
        }

        if order.len() != names.len() {
            // 校验已通过，这里只可能是内部不一致
            let cycle = self
                .find_cycles(&names)
                .into_iter()
                .next()
                .map(|c| c.path)
                .unwrap_or_default();
            return Err(CoreError::CircularDependency { cycle });
        }

        Ok(order)
    }

    /// 计算停止顺序（启动顺序的精确反序）
    pub fn get_shutdown_order(&self) -> Result<Vec<String>> {
        let mut order = self.get_startup_order()?;
        order.reverse();
        Ok(order)
    }

    /// 排序使用的边：全部硬依赖，加上不会成环的已注册可选依赖
    fn ordering_edges<'a>(&'a self, names: &'a [String]) -> HashMap<&'a str, Vec<&'a str>> {
        let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();

        for name in names {
            let entry = edges.entry(name.as_str()).or_default();
            if let Some(deps) = self.graph.edges.get(name) {
                for dep in deps {
                    if !entry.contains(&dep.as_str()) {
                        entry.push(dep.as_str());
                    }
                }
            }
        }

        for name in names {
            let Some(manifest) = self.manifests.get(name) else {
                continue;
            };
            for optional in &manifest.optional_dependencies {
                let Some((optional, _)) = self.manifests.get_key_value(optional) else {
                    continue;
                };
                let optional = optional.as_str();
                let already = edges
                    .get(name.as_str())
                    .is_some_and(|deps| deps.contains(&optional));
                if optional == name || already {
                    continue;
                }
                if reaches(&edges, optional, name) {
                    debug!(module = %name, optional, "可选依赖会造成循环，忽略其排序约束");
                    continue;
                }
                edges.entry(name.as_str()).or_default().push(optional);
            }
        }

        edges
    }

    fn priority_of(&self, name: &str) -> i32 {
        self.manifests
            .get(name)
            .map(|m| m.priority)
            .unwrap_or(crate::module::metadata::DEFAULT_PRIORITY)
    }

    // ==================== 查询 ====================

    /// 直接依赖（声明顺序）；未注册的模块返回空
    pub fn get_direct_dependencies(&self, name: &str) -> Vec<String> {
        if !self.contains(name) {
            return Vec::new();
        }
        self.graph.get_dependencies(name)
    }

    /// 全部传递依赖（广度优先）；未注册的模块返回空
    pub fn get_all_dependencies(&self, name: &str) -> Vec<String> {
        if !self.contains(name) {
            return Vec::new();
        }
        bfs(name, |n| self.graph.get_dependencies(n))
    }

    /// 直接依赖方（按名称排序）；未注册的模块返回空
    pub fn get_direct_dependents(&self, name: &str) -> Vec<String> {
        if !self.contains(name) {
            return Vec::new();
        }
        let mut dependents = self.graph.get_dependents(name);
        dependents.sort();
        dependents
    }

    /// 全部传递依赖方（广度优先）；未注册的模块返回空
    pub fn get_dependents(&self, name: &str) -> Vec<String> {
        if !self.contains(name) {
            return Vec::new();
        }
        bfs(name, |n| {
            let mut dependents = self.graph.get_dependents(n);
            dependents.sort();
            dependents
        })
    }
}

/// 从 `from` 出发沿依赖边是否能到达 `to`
fn reaches(edges: &HashMap<&str, Vec<&str>>, from: &str, to: &str) -> bool {
    let mut stack = vec![from];
    let mut visited = HashSet::new();

    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(next) = edges.get(node) {
            stack.extend(next.iter().copied());
        }
    }

    false
}

/// 广度优先遍历，结果不含起点
fn bfs<F>(start: &str, neighbors: F) -> Vec<String>
where
    F: Fn(&str) -> Vec<String>,
{
    let mut visited = BTreeSet::new();
    visited.insert(start.to_string());

    let mut queue = VecDeque::from([start.to_string()]);
    let mut result = Vec::new();

    while let Some(node) = queue.pop_front() {
        for next in neighbors(&node) {
            if visited.insert(next.clone()) {
                result.push(next.clone());
                queue.push_back(next);
            }
        }
    }

    result
}

/// 将环旋转为从最小名称开始，并补上闭合节点
fn normalize_cycle(nodes: &[String]) -> Vec<String> {
    let start = nodes
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut cycle: Vec<String> = nodes[start..]
        .iter()
        .chain(nodes[..start].iter())
        .cloned()
        .collect();
    if let Some(first) = cycle.first().cloned() {
        cycle.push(first);
    }
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_with(manifests: Vec<ModuleManifest>) -> DependencyResolver {
        let mut resolver = DependencyResolver::new();
        for manifest in manifests {
            resolver.register_module(manifest).unwrap();
        }
        resolver
    }

    // ==================== DependencyGraph 测试 ====================

    #[test]
    fn test_dependency_graph_new() {
        let graph = DependencyGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.module_count(), 0);
    }

    #[test]
    fn test_add_dependency_duplicate() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("a", "b");

        assert_eq!(graph.get_dependencies("a").len(), 1);
        assert_eq!(graph.get_dependents("b").len(), 1);
    }

    #[test]
    fn test_set_dependencies_keeps_incoming_edges() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "c");

        graph.set_dependencies("b", &["d".to_string()]);

        assert_eq!(graph.get_dependencies("b"), vec!["d"]);
        assert!(graph.get_dependents("c").is_empty());
        assert_eq!(graph.get_dependents("b"), vec!["a"]);
    }

    #[test]
    fn test_remove_dependency() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("a", "c");

        graph.remove_dependency("a", "b");

        assert_eq!(graph.get_dependencies("a"), vec!["c"]);
        assert!(graph.get_dependents("b").is_empty());
    }

    // ==================== 注册 ====================

    #[test]
    fn test_register_empty_name_fails() {
        let mut resolver = DependencyResolver::new();
        let result = resolver.register_module(ModuleManifest::new(""));
        assert!(matches!(result, Err(CoreError::InvalidManifest(_))));
        assert!(resolver.is_empty());
    }

    #[test]
    fn test_reregistration_replaces_manifest() {
        let mut resolver = resolver_with(vec![
            ModuleManifest::new("a"),
            ModuleManifest::new("b").depends_on("a"),
        ]);

        let previous = resolver
            .register_shared(Arc::new(ModuleManifest::new("b")))
            .unwrap();

        assert!(previous.is_some());
        assert_eq!(resolver.len(), 2);
        assert!(resolver.get_direct_dependencies("b").is_empty());
        assert!(resolver.get_direct_dependents("a").is_empty());
    }

    // ==================== 校验 ====================

    #[test]
    fn test_validate_missing_dependency() {
        let resolver = resolver_with(vec![ModuleManifest::new("d").depends_on("e")]);

        let result = resolver.validate_dependencies();

        assert!(!result.is_valid);
        assert_eq!(
            result.missing,
            vec![MissingDependency {
                module: "d".to_string(),
                dependency: "e".to_string(),
            }]
        );
        assert!(result.cycles.is_empty());
    }

    #[test]
    fn test_validate_two_node_cycle() {
        let resolver = resolver_with(vec![
            ModuleManifest::new("x").depends_on("y"),
            ModuleManifest::new("y").depends_on("x"),
        ]);

        let result = resolver.validate_dependencies();

        assert!(!result.is_valid);
        assert_eq!(result.cycles.len(), 1);
        let cycle = &result.cycles[0];
        assert!(cycle.contains("x"));
        assert!(cycle.contains("y"));
        assert_eq!(cycle.path, vec!["x", "y", "x"]);
    }

    #[test]
    fn test_validate_self_loop() {
        let resolver = resolver_with(vec![ModuleManifest::new("a").depends_on("a")]);

        let result = resolver.validate_dependencies();

        assert!(!result.is_valid);
        assert_eq!(result.cycles[0].path, vec!["a", "a"]);
    }

    #[test]
    fn test_validate_reports_full_cycle_path() {
        let resolver = resolver_with(vec![
            ModuleManifest::new("app").depends_on("b"),
            ModuleManifest::new("b").depends_on("c"),
            ModuleManifest::new("c").depends_on("d"),
            ModuleManifest::new("d").depends_on("b"),
        ]);

        let result = resolver.validate_dependencies();

        assert_eq!(result.cycles.len(), 1);
        assert_eq!(result.cycles[0].path, vec!["b", "c", "d", "b"]);
        assert!(!result.cycles[0].contains("app"));
    }

    #[test]
    fn test_validate_is_repeatable() {
        let resolver = resolver_with(vec![
            ModuleManifest::new("x").depends_on("y"),
            ModuleManifest::new("y").depends_on("x"),
            ModuleManifest::new("z").depends_on("missing"),
        ]);

        let first = resolver.validate_dependencies();
        let second = resolver.validate_dependencies();

        assert_eq!(first, second);
        assert_eq!(first.errors().len(), 2);
    }

    #[test]
    fn test_validate_conflicts_do_not_invalidate() {
        let resolver = resolver_with(vec![
            ModuleManifest::new("sqlite").conflicts_with("postgres"),
            ModuleManifest::new("postgres").conflicts_with("sqlite"),
            ModuleManifest::new("redis").conflicts_with("memcached"),
        ]);

        let result = resolver.validate_dependencies();

        assert!(result.is_valid);
        assert_eq!(result.conflicts.len(), 1);
    }

    // ==================== 排序 ====================

    #[test]
    fn test_startup_order_chain() {
        let resolver = resolver_with(vec![
            ModuleManifest::new("c").depends_on("a").depends_on("b"),
            ModuleManifest::new("a"),
            ModuleManifest::new("b").depends_on("a"),
        ]);

        assert_eq!(resolver.get_startup_order().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(resolver.get_shutdown_order().unwrap(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_startup_order_priority_tie_break() {
        let resolver = resolver_with(vec![
            ModuleManifest::new("late").with_priority(100),
            ModuleManifest::new("early").with_priority(50),
        ]);

        assert_eq!(resolver.get_startup_order().unwrap(), vec!["early", "late"]);
    }

    #[test]
    fn test_startup_order_name_tie_break() {
        let resolver = resolver_with(vec![
            ModuleManifest::new("zeta"),
            ModuleManifest::new("alpha"),
            ModuleManifest::new("mid"),
        ]);

        assert_eq!(
            resolver.get_startup_order().unwrap(),
            vec!["alpha", "mid", "zeta"]
        );
    }

    #[test]
    fn test_priority_never_overrides_dependencies() {
        let resolver = resolver_with(vec![
            ModuleManifest::new("base").with_priority(1000),
            ModuleManifest::new("eager").depends_on("base").with_priority(1),
            ModuleManifest::new("other").with_priority(500),
        ]);

        let order = resolver.get_startup_order().unwrap();

        assert_eq!(order, vec!["other", "base", "eager"]);
    }

    #[test]
    fn test_startup_order_diamond() {
        //     app
        //    /   \
        //   a     b
        //    \   /
        //      c
        let resolver = resolver_with(vec![
            ModuleManifest::new("app").depends_on("a").depends_on("b"),
            ModuleManifest::new("a").depends_on("c"),
            ModuleManifest::new("b").depends_on("c"),
            ModuleManifest::new("c"),
        ]);

        assert_eq!(
            resolver.get_startup_order().unwrap(),
            vec!["c", "a", "b", "app"]
        );
    }

    #[test]
    fn test_startup_order_fails_on_invalid_graph() {
        let resolver = resolver_with(vec![ModuleManifest::new("d").depends_on("e")]);

        let err = resolver.get_startup_order().unwrap_err();
        match err {
            CoreError::ValidationFailed(result) => {
                assert_eq!(result.missing.len(), 1);
                assert_eq!(result.missing[0].dependency, "e");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_optional_dependency_orders_ahead_when_present() {
        let resolver = resolver_with(vec![
            ModuleManifest::new("api").optionally_depends_on("metrics"),
            ModuleManifest::new("metrics").with_priority(500),
        ]);

        assert_eq!(resolver.get_startup_order().unwrap(), vec!["metrics", "api"]);
    }

    #[test]
    fn test_optional_dependency_absent_is_not_error() {
        let resolver = resolver_with(vec![
            ModuleManifest::new("api").optionally_depends_on("metrics")
        ]);

        let result = resolver.validate_dependencies();
        assert!(result.is_valid);
        assert_eq!(resolver.get_startup_order().unwrap(), vec!["api"]);
    }

    #[test]
    fn test_optional_dependency_cycle_is_ignored() {
        let resolver = resolver_with(vec![
            ModuleManifest::new("a").depends_on("b"),
            ModuleManifest::new("b").optionally_depends_on("a"),
        ]);

        assert!(resolver.validate_dependencies().is_valid);
        assert_eq!(resolver.get_startup_order().unwrap(), vec!["b", "a"]);
    }

    // ==================== 查询 ====================

    #[test]
    fn test_transitive_queries() {
        let resolver = resolver_with(vec![
            ModuleManifest::new("a"),
            ModuleManifest::new("b").depends_on("a"),
            ModuleManifest::new("c").depends_on("b"),
            ModuleManifest::new("d").depends_on("a"),
        ]);

        assert_eq!(resolver.get_direct_dependencies("c"), vec!["b"]);
        assert_eq!(resolver.get_all_dependencies("c"), vec!["b", "a"]);
        assert_eq!(resolver.get_direct_dependents("a"), vec!["b", "d"]);
        assert_eq!(resolver.get_dependents("a"), vec!["b", "d", "c"]);
    }

    #[test]
    fn test_queries_for_unknown_module_are_empty() {
        let resolver = resolver_with(vec![ModuleManifest::new("d").depends_on("e")]);

        assert!(resolver.get_direct_dependencies("nope").is_empty());
        assert!(resolver.get_all_dependencies("nope").is_empty());
        assert!(resolver.get_direct_dependents("e").is_empty());
        assert!(resolver.get_dependents("e").is_empty());
    }

    #[test]
    fn test_normalize_cycle() {
        let nodes = vec!["c".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(normalize_cycle(&nodes), vec!["a", "b", "c", "a"]);
    }
}
