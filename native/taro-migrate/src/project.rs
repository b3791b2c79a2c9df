//! Project Model
//!
//! Locates the build configuration and the entry module, reads `sourceRoot`
//! and the page list out of them, and plans the in-place rewrites of both
//! files. Every fatal check happens in [`Project::load`], before the caller
//! writes anything.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ArrayExpressionElement, Class, Expression, ObjectExpression, Program, Statement,
    StaticMemberExpression,
};
use oxc_ast_visit::Visit;
use oxc_span::{GetSpan, Span};
use serde::Serialize;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::commit::PendingWrite;
use crate::deps::is_deprecated;
use crate::error::{MigrateError, Result};
use crate::imports::{ensure_named_import, CURRENT_INSTANCE_FACTORY, TARO_PACKAGE};
use crate::options::MigrateOptions;
use crate::passes::{config_artifact_path, config_module};
use crate::predicates::{
    config_fields, find_method, find_top_level, has_member, has_object_property, is_this_member,
    member_assignments, object_property, render_bootstrap, resolve_default_export,
    strip_wrappers, top_level_classes, ComponentKind, DefaultExport,
};
use crate::syntax::{
    append_property, apply_edits, parse, removal_span, statement_span, CodeStyle, SourceEdit,
    SyntaxTree,
};

const BUILD_CONFIG_CANDIDATES: [&str; 2] = ["config/index.js", "config/index.ts"];
const SCRIPT_EXTENSIONS: [&str; 4] = ["js", "jsx", "ts", "tsx"];
const ENTRY_STEM: &str = "app";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub root_dir: PathBuf,
    pub build_config_path: PathBuf,
    /// As declared, relative to `root_dir`.
    pub source_root: String,
    pub entry_file_path: PathBuf,
    /// Relative to the source root, extensionless, unique, declared order.
    pub pages: Vec<String>,
}

/// A loaded project and the writes its two control files need.
#[derive(Debug)]
pub struct ProjectPlan {
    pub project: Project,
    /// Writes grouped by the file that owns them; each group commits as one.
    pub writes: Vec<(PathBuf, Vec<PendingWrite>)>,
}

impl Project {
    pub fn source_dir(&self) -> PathBuf {
        self.root_dir.join(&self.source_root)
    }

    /// Page modules on disk, entry excluded. Pages with no module are logged
    /// and dropped.
    pub fn page_files(&self) -> Vec<PathBuf> {
        let source_dir = self.source_dir();
        let mut files = Vec::new();
        for page in &self.pages {
            let base = source_dir.join(page.trim_start_matches('/'));
            let found = ["tsx", "ts", "jsx", "js"].iter().find_map(|ext| {
                let mut name = OsString::from(base.as_os_str());
                name.push(".");
                name.push(ext);
                let file = PathBuf::from(name);
                file.is_file().then_some(file)
            });
            match found {
                Some(file) if file != self.entry_file_path && !files.contains(&file) => {
                    files.push(file)
                }
                Some(_) => {}
                None => tracing::warn!(page = %page, "page module not found"),
            }
        }
        files
    }

    /// Resolve the project under `options.root_dir` and plan the control-file
    /// rewrites. Fails only with fatal errors.
    pub fn load(options: &MigrateOptions) -> Result<ProjectPlan> {
        let root = options.root_dir.as_path();
        let build_config_path = locate_build_config(root)?;
        let config_source = read_source(&build_config_path)?;
        let config_allocator = Allocator::default();
        let config_tree = parse_project_file(&config_allocator, &config_source, &build_config_path)?;
        let BuildConfig {
            source_root,
            edits: config_edits,
        } = extract_source_root(&config_tree, options).ok_or_else(|| {
            MigrateError::SourceRootMissing {
                path: build_config_path.clone(),
            }
        })?;

        let source_dir = root.join(&source_root);
        if source_root.trim().is_empty() || !source_dir.is_dir() {
            return Err(MigrateError::SourceRootInvalid {
                root: root.to_path_buf(),
                source_root,
            });
        }

        let entry_file_path = locate_entry(&source_dir)?;
        let entry_source = read_source(&entry_file_path)?;
        let entry_allocator = Allocator::default();
        let entry_tree = parse_project_file(&entry_allocator, &entry_source, &entry_file_path)?;

        let mut pages = extract_pages(entry_tree.program());
        if pages.is_empty() {
            pages = app_config_pages(&entry_file_path)?;
        }
        let entry_writes = rewrite_entry(&entry_tree);

        let mut writes = Vec::new();
        if !config_edits.is_empty() {
            let contents = apply_edits(&config_source, &config_edits);
            writes.push((
                build_config_path.clone(),
                vec![PendingWrite::overwrite(&build_config_path, contents)],
            ));
        }
        if !entry_writes.is_empty() {
            writes.push((entry_file_path.clone(), entry_writes));
        }

        let project = Project {
            root_dir: root.to_path_buf(),
            build_config_path,
            source_root,
            entry_file_path,
            pages,
        };
        tracing::info!(
            source_root = %project.source_root,
            entry = %project.entry_file_path.display(),
            pages = project.pages.len(),
            "project loaded"
        );
        Ok(ProjectPlan { project, writes })
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| MigrateError::io(path, err))
}

fn parse_project_file<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    path: &'a Path,
) -> Result<SyntaxTree<'a>> {
    parse(allocator, source, path).map_err(|source| MigrateError::InvalidProjectFile {
        path: path.to_path_buf(),
        source,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILD CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn locate_build_config(root: &Path) -> Result<PathBuf> {
    BUILD_CONFIG_CANDIDATES
        .iter()
        .map(|candidate| root.join(candidate))
        .find(|path| path.is_file())
        .ok_or_else(|| MigrateError::ConfigNotFound {
            root: root.to_path_buf(),
        })
}

/// `sourceRoot` plus the edits that bring the enclosing object up to date.
struct BuildConfig {
    source_root: String,
    edits: Vec<SourceEdit>,
}

struct BuildConfigScan<'o> {
    source: &'o str,
    options: &'o MigrateOptions,
    style: CodeStyle,
    found: Option<BuildConfig>,
}

impl<'a, 'o> Visit<'a> for BuildConfigScan<'o> {
    fn visit_object_expression(&mut self, object: &ObjectExpression<'a>) {
        if self.found.is_some() {
            return;
        }
        let source_root = object_property(object, "sourceRoot").and_then(string_value);
        if let Some(source_root) = source_root {
            self.found = Some(BuildConfig {
                source_root,
                edits: rewrite_build_config(self.source, object, self.options, self.style),
            });
            return;
        }
        oxc_ast_visit::walk::walk_object_expression(self, object);
    }
}

/// The first object literal declaring a string `sourceRoot` is the
/// configuration object.
fn extract_source_root(tree: &SyntaxTree, options: &MigrateOptions) -> Option<BuildConfig> {
    let mut scan = BuildConfigScan {
        source: tree.source(),
        options,
        style: tree.style(),
        found: None,
    };
    scan.visit_program(tree.program());
    scan.found
}

/// Ensure `framework` and the define-constant entry. Existing values are
/// never touched.
fn rewrite_build_config(
    source: &str,
    config: &ObjectExpression,
    options: &MigrateOptions,
    style: CodeStyle,
) -> Vec<SourceEdit> {
    let mut edits = Vec::new();
    let mut appended = Vec::new();

    let key = options.define_constant.key.as_str();
    let constant = format!("{}: {}", style.quoted(key), options.define_constant.value);
    match object_property(config, "defineConstants").map(strip_wrappers) {
        None => appended.push(format!("defineConstants: {{ {constant} }}")),
        Some(Expression::ObjectExpression(constants)) => {
            if !has_object_property(constants, key) {
                edits.push(append_property(source, constants, &constant));
            }
        }
        Some(_) => tracing::warn!("`defineConstants` is not an object literal, left unchanged"),
    }
    if !has_object_property(config, "framework") {
        appended.push(format!("framework: {}", style.quoted(&options.framework)));
    }

    edits.extend(
        appended
            .iter()
            .map(|entry| append_property(source, config, entry)),
    );
    edits
}

fn string_value(expr: &Expression) -> Option<String> {
    match strip_wrappers(expr) {
        Expression::StringLiteral(lit) => Some(lit.value.to_string()),
        Expression::TemplateLiteral(tpl) if tpl.expressions.is_empty() => tpl
            .quasis
            .first()
            .and_then(|q| q.value.cooked.as_ref())
            .map(|cooked| cooked.to_string()),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY MODULE
// ═══════════════════════════════════════════════════════════════════════════════

pub fn locate_entry(source_dir: &Path) -> Result<PathBuf> {
    SCRIPT_EXTENSIONS
        .iter()
        .map(|ext| source_dir.join(format!("{ENTRY_STEM}.{ext}")))
        .find(|path| path.is_file())
        .ok_or_else(|| MigrateError::EntryNotFound {
            dir: source_dir.to_path_buf(),
        })
}

/// The app component: the default export, else the class handed to
/// `Taro.render`, else the module's only class.
fn entry_class<'t, 'a>(program: &'t Program<'a>) -> Option<&'t Class<'a>> {
    if let DefaultExport::Component(ComponentKind::ClassComponent(class)) =
        resolve_default_export(program)
    {
        return Some(class);
    }
    if let Some((_, name)) = render_bootstrap(program) {
        if let Some(ComponentKind::ClassComponent(class)) = find_top_level(program, name) {
            return Some(class);
        }
    }
    match top_level_classes(program).as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

/// The app config object and, when it lives on the component, the span to
/// remove once it has been moved out.
struct AppConfig<'t, 'a> {
    object: &'t ObjectExpression<'a>,
    movable: Option<Span>,
}

fn app_config<'t, 'a>(program: &'t Program<'a>) -> Option<AppConfig<'t, 'a>> {
    if let DefaultExport::Object(object) = resolve_default_export(program) {
        return Some(AppConfig {
            object,
            movable: None,
        });
    }
    let class = entry_class(program)?;
    if let Some((prop, object)) = config_fields(class).next() {
        return Some(AppConfig {
            object,
            movable: Some(prop.span),
        });
    }
    let name = class.id.as_ref()?.name.as_str();
    member_assignments(program, "config").find_map(|(owner, stmt, assign)| {
        match strip_wrappers(&assign.right) {
            Expression::ObjectExpression(object) if owner == name => Some(AppConfig {
                object,
                movable: Some(stmt.span),
            }),
            _ => None,
        }
    })
}

fn push_unique(pages: &mut Vec<String>, seen: &mut HashSet<String>, page: String) {
    if seen.insert(page.clone()) {
        pages.push(page);
    }
}

fn string_elements(expr: Option<&Expression>) -> Vec<String> {
    let Some(Expression::ArrayExpression(array)) = expr.map(strip_wrappers) else {
        return Vec::new();
    };
    array
        .elements
        .iter()
        .filter_map(|el| match el {
            ArrayExpressionElement::StringLiteral(lit) => Some(lit.value.to_string()),
            ArrayExpressionElement::TemplateLiteral(tpl) if tpl.expressions.is_empty() => tpl
                .quasis
                .first()
                .and_then(|q| q.value.cooked.as_ref())
                .map(|cooked| cooked.to_string()),
            _ => None,
        })
        .collect()
}

/// `pages` in declared order, then every sub-package page as `root/page`.
/// Repeats keep their first position.
pub fn pages_from_config(config: &ObjectExpression) -> Vec<String> {
    let mut pages = Vec::new();
    let mut seen = HashSet::new();
    for page in string_elements(object_property(config, "pages")) {
        push_unique(&mut pages, &mut seen, page);
    }
    for key in ["subPackages", "subpackages"] {
        let Some(Expression::ArrayExpression(packages)) =
            object_property(config, key).map(strip_wrappers)
        else {
            continue;
        };
        for package in &packages.elements {
            let ArrayExpressionElement::ObjectExpression(package) = package else {
                continue;
            };
            let Some(root) = object_property(package, "root").and_then(string_value) else {
                continue;
            };
            let root = root.trim_end_matches('/');
            for page in string_elements(object_property(package, "pages")) {
                push_unique(&mut pages, &mut seen, format!("{root}/{page}"));
            }
        }
    }
    pages
}

pub fn extract_pages(program: &Program) -> Vec<String> {
    app_config(program)
        .map(|config| pages_from_config(config.object))
        .unwrap_or_default()
}

/// Pages from an `app.config.*` written by an earlier run.
fn app_config_pages(entry: &Path) -> Result<Vec<String>> {
    for ext in ["ts", "js"] {
        let path = entry.with_file_name(format!("{ENTRY_STEM}.config.{ext}"));
        if !path.is_file() {
            continue;
        }
        let source = read_source(&path)?;
        let allocator = Allocator::default();
        let tree = parse_project_file(&allocator, &source, &path)?;
        if let DefaultExport::Object(object) = resolve_default_export(tree.program()) {
            return Ok(pages_from_config(object));
        }
    }
    Ok(Vec::new())
}

struct LaunchParams {
    edits: Vec<SourceEdit>,
}

impl<'a> Visit<'a> for LaunchParams {
    fn visit_static_member_expression(&mut self, expr: &StaticMemberExpression<'a>) {
        if expr.property.name == "params" {
            if let Expression::StaticMemberExpression(inner) = &expr.object {
                if is_this_member(inner, "$router") {
                    self.edits.push(SourceEdit::replace(
                        expr.span,
                        format!("{CURRENT_INSTANCE_FACTORY}().router.params"),
                    ));
                    return;
                }
            }
        }
        oxc_ast_visit::walk::walk_static_member_expression(self, expr);
    }
}

/// Writes for the entry: its own rewrite plus the extracted app config.
fn rewrite_entry(tree: &SyntaxTree) -> Vec<PendingWrite> {
    let program = tree.program();
    let source = tree.source();
    let style = tree.style();
    let mut edits = Vec::new();
    let mut writes = Vec::new();

    if let Some(AppConfig {
        object,
        movable: Some(span),
    }) = app_config(program)
    {
        writes.push(PendingWrite::create(
            config_artifact_path(tree.path()),
            config_module(source, object),
        ));
        edits.push(SourceEdit::remove(removal_span(source, span)));
    }

    if let Some(class) = entry_class(program) {
        if let Some(hook) = find_method(class, "componentWillMount") {
            if !has_member(class, "onLaunch") {
                edits.push(SourceEdit::replace(hook.key.span(), "onLaunch"));
            }
        }
    }

    let mut launch = LaunchParams { edits: Vec::new() };
    launch.visit_program(program);
    if !launch.edits.is_empty() {
        edits.append(&mut launch.edits);
        edits.extend(ensure_named_import(tree, TARO_PACKAGE, CURRENT_INSTANCE_FACTORY));
    }

    if let Some((stmt, name)) = render_bootstrap(program) {
        match resolve_default_export(program) {
            DefaultExport::Missing => edits.push(SourceEdit::replace(
                statement_span(source, stmt.span),
                format!("export default {name}{}", style.terminator()),
            )),
            _ => edits.push(SourceEdit::remove(removal_span(source, stmt.span))),
        }
    }

    for stmt in &program.body {
        if let Statement::ImportDeclaration(decl) = stmt {
            if decl.specifiers.is_none() && is_deprecated(decl.source.value.as_str()) {
                edits.push(SourceEdit::remove(removal_span(source, decl.span)));
            }
        }
    }

    if !edits.is_empty() {
        writes.push(PendingWrite::overwrite(
            tree.path(),
            apply_edits(source, &edits),
        ));
    }
    writes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const LEGACY_CONFIG: &str = "const config = {\n  projectName: 'demo',\n  sourceRoot: 'src',\n  outputRoot: 'dist',\n  defineConstants: {\n  },\n}\n\nmodule.exports = function (merge) {\n  return merge({}, config)\n}\n";

    const LEGACY_ENTRY: &str = r#"import '@tarojs/async-await'
import Taro, { Component } from '@tarojs/taro'
import Index from './pages/index'

class App extends Component {
  config = {
    pages: [
      'pages/index/index',
      'pages/me/me',
      'pages/index/index'
    ],
    subPackages: [{ root: 'sub/', pages: ['detail/index'] }]
  }

  componentWillMount() {
    console.log(this.$router.params)
  }

  render() {
    return <Index />
  }
}

Taro.render(<App />, document.getElementById('app'))
"#;

    fn fixture(config: &str, entry: Option<(&str, &str)>) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::create_dir_all(dir.path().join("src/pages/index")).unwrap();
        fs::write(dir.path().join("config/index.js"), config).unwrap();
        if let Some((name, code)) = entry {
            fs::write(dir.path().join("src").join(name), code).unwrap();
        }
        dir
    }

    fn load(dir: &TempDir) -> Result<ProjectPlan> {
        Project::load(&MigrateOptions::new(dir.path()))
    }

    fn write_for<'p>(plan: &'p ProjectPlan, path: &Path) -> &'p PendingWrite {
        plan.writes
            .iter()
            .flat_map(|(_, writes)| writes)
            .find(|w| w.path == path)
            .unwrap()
    }

    #[test]
    fn test_legacy_project_is_planned() {
        let dir = fixture(LEGACY_CONFIG, Some(("app.jsx", LEGACY_ENTRY)));
        let plan = load(&dir).unwrap();
        let project = &plan.project;
        assert_eq!(project.source_root, "src");
        assert_eq!(project.entry_file_path, dir.path().join("src/app.jsx"));
        assert_eq!(
            project.pages,
            vec!["pages/index/index", "pages/me/me", "sub/detail/index"]
        );

        let config = write_for(&plan, &dir.path().join("config/index.js"));
        assert_eq!(
            config.contents,
            "const config = {\n  projectName: 'demo',\n  sourceRoot: 'src',\n  outputRoot: 'dist',\n  defineConstants: {\n    'process.env.TARO_ENV': JSON.stringify(process.env.TARO_ENV)\n  },\n  framework: 'react',\n}\n\nmodule.exports = function (merge) {\n  return merge({}, config)\n}\n"
        );

        let entry = write_for(&plan, &dir.path().join("src/app.jsx"));
        assert!(!entry.create_only);
        assert!(!entry.contents.contains("@tarojs/async-await"));
        assert!(!entry.contents.contains("config = {"));
        assert!(entry.contents.contains("  onLaunch() {\n    console.log(getCurrentInstance().router.params)\n  }"));
        assert!(entry
            .contents
            .starts_with("import Taro, { Component, getCurrentInstance } from '@tarojs/taro'\n"));
        assert!(entry.contents.ends_with("}\n\nexport default App\n"));

        let app_config = write_for(&plan, &dir.path().join("src/app.config.js"));
        assert!(app_config.create_only);
        assert!(app_config
            .contents
            .starts_with("export default {\n  pages: [\n    'pages/index/index',\n"));
    }

    #[test]
    fn test_migrated_project_plans_nothing() {
        let config = "export default {\n  sourceRoot: 'src',\n  framework: 'react',\n  defineConstants: { 'process.env.TARO_ENV': JSON.stringify(process.env.TARO_ENV) },\n}\n";
        let entry = "import { Component } from 'react'\n\nclass App extends Component {\n  onLaunch() {}\n  render() { return this.props.children }\n}\n\nexport default App\n";
        let dir = fixture(config, Some(("app.tsx", entry)));
        fs::write(
            dir.path().join("src/app.config.ts"),
            "export default {\n  pages: ['pages/index/index']\n}\n",
        )
        .unwrap();
        let plan = load(&dir).unwrap();
        assert!(plan.writes.is_empty());
        assert_eq!(plan.project.pages, vec!["pages/index/index"]);
    }

    #[test]
    fn test_existing_define_constants_are_extended() {
        let config = "module.exports = { sourceRoot: 'src', framework: 'react', defineConstants: { A: '1' } }\n";
        let dir = fixture(config, Some(("app.js", "export default {}\n")));
        let plan = load(&dir).unwrap();
        let write = write_for(&plan, &dir.path().join("config/index.js"));
        assert_eq!(
            write.contents,
            "module.exports = { sourceRoot: 'src', framework: 'react', defineConstants: { A: '1', 'process.env.TARO_ENV': JSON.stringify(process.env.TARO_ENV) } }\n"
        );
    }

    #[test]
    fn test_missing_config_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir).unwrap_err();
        assert!(matches!(err, MigrateError::ConfigNotFound { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_source_root_is_fatal() {
        let dir = fixture("module.exports = { outputRoot: 'dist' }\n", None);
        let err = load(&dir).unwrap_err();
        assert!(matches!(err, MigrateError::SourceRootMissing { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_source_root_must_exist() {
        let dir = fixture("module.exports = { sourceRoot: 'client' }\n", None);
        assert!(matches!(
            load(&dir).unwrap_err(),
            MigrateError::SourceRootInvalid { .. }
        ));
    }

    #[test]
    fn test_entry_must_exist() {
        let dir = fixture("module.exports = { sourceRoot: 'src' }\n", None);
        assert!(matches!(
            load(&dir).unwrap_err(),
            MigrateError::EntryNotFound { .. }
        ));
    }

    #[test]
    fn test_unparsable_entry_is_fatal() {
        let dir = fixture(
            "module.exports = { sourceRoot: 'src' }\n",
            Some(("app.js", "class {\n")),
        );
        let err = load(&dir).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidProjectFile { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_plain_object_entry_pages() {
        let allocator = Allocator::default();
        let path = PathBuf::from("app.js");
        let code = "export default { pages: ['a', 'b', 'a', `c`] }\n";
        let tree = parse(&allocator, code, &path).unwrap();
        assert_eq!(extract_pages(tree.program()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_page_files_resolve_extensions() {
        let dir = fixture(
            "module.exports = { sourceRoot: 'src' }\n",
            Some(("app.js", "export default { pages: ['pages/index/index', 'pages/gone/gone', 'pages/index/index'] }\n")),
        );
        fs::write(dir.path().join("src/pages/index/index.tsx"), "export default 1\n").unwrap();
        let plan = load(&dir).unwrap();
        assert_eq!(
            plan.project.page_files(),
            vec![dir.path().join("src/pages/index/index.tsx")]
        );
    }
}
