//! Structural predicates over the oxc tree.
//!
//! Every "is this pattern present" question the passes ask goes through here,
//! so the shapes a pass recognises read as data instead of ad hoc probing.

use oxc_ast::ast::{
    Argument, AssignmentExpression, AssignmentTarget, Class, ClassElement, Declaration,
    ExportDefaultDeclarationKind, Expression, ExpressionStatement, Function, JSXElementName,
    MethodDefinition, ObjectExpression, ObjectPropertyKind, Program, PropertyDefinition,
    PropertyKey, Statement, StaticMemberExpression, BindingPattern,
};

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT KINDS
// ═══════════════════════════════════════════════════════════════════════════════

/// The two component authoring styles a page can use.
#[derive(Debug, Clone, Copy)]
pub enum ComponentKind<'t, 'a> {
    ClassComponent(&'t Class<'a>),
    FunctionComponent { name: Option<&'t str> },
}

impl<'t, 'a> ComponentKind<'t, 'a> {
    pub fn name(&self) -> Option<&'t str> {
        match *self {
            ComponentKind::ClassComponent(class) => class.id.as_ref().map(|id| id.name.as_str()),
            ComponentKind::FunctionComponent { name, .. } => name,
        }
    }

    fn from_function(func: &'t Function<'a>) -> Self {
        ComponentKind::FunctionComponent {
            name: func.id.as_ref().map(|id| id.name.as_str()),
        }
    }
}

/// What a module's `export default` resolves to.
#[derive(Debug)]
pub enum DefaultExport<'t, 'a> {
    Component(ComponentKind<'t, 'a>),
    Object(&'t ObjectExpression<'a>),
    Missing,
    Unresolved(String),
}

pub fn resolve_default_export<'t, 'a>(program: &'t Program<'a>) -> DefaultExport<'t, 'a> {
    let mut found = program.body.iter().filter_map(|stmt| match stmt {
        Statement::ExportDefaultDeclaration(decl) => Some(decl),
        _ => None,
    });
    let Some(decl) = found.next() else {
        return DefaultExport::Missing;
    };
    if found.next().is_some() {
        return DefaultExport::Unresolved("more than one default export".to_string());
    }

    match &decl.declaration {
        ExportDefaultDeclarationKind::ClassDeclaration(class) => {
            DefaultExport::Component(ComponentKind::ClassComponent(class))
        }
        ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
            DefaultExport::Component(ComponentKind::from_function(func))
        }
        kind => {
            let Some(expr) = kind.as_expression().map(strip_wrappers) else {
                return DefaultExport::Unresolved("unsupported default export shape".to_string());
            };
            match expr {
                Expression::ObjectExpression(object) => DefaultExport::Object(object),
                Expression::ClassExpression(class) => {
                    DefaultExport::Component(ComponentKind::ClassComponent(class))
                }
                Expression::ArrowFunctionExpression(_) => {
                    DefaultExport::Component(ComponentKind::FunctionComponent { name: None })
                }
                Expression::FunctionExpression(func) => {
                    DefaultExport::Component(ComponentKind::from_function(func))
                }
                Expression::Identifier(ident) => match find_top_level(program, &ident.name) {
                    Some(kind) => DefaultExport::Component(kind),
                    None => DefaultExport::Unresolved(format!(
                        "default export `{}` is not a component declared in this file",
                        ident.name
                    )),
                },
                Expression::CallExpression(_) => {
                    let mut names = Vec::new();
                    collect_wrapped_identifiers(expr, &mut names);
                    let mut resolved = names
                        .iter()
                        .filter_map(|name| find_top_level(program, name));
                    match (resolved.next(), resolved.next()) {
                        (Some(kind), None) => DefaultExport::Component(kind),
                        (Some(_), Some(_)) => DefaultExport::Unresolved(
                            "default export wraps several components".to_string(),
                        ),
                        (None, _) => DefaultExport::Unresolved(
                            "default export wraps no component declared in this file".to_string(),
                        ),
                    }
                }
                _ => DefaultExport::Unresolved("unsupported default export shape".to_string()),
            }
        }
    }
}

/// Identifier arguments of a higher-order call such as `connect(a)(Index)`.
fn collect_wrapped_identifiers<'t>(expr: &'t Expression, names: &mut Vec<&'t str>) {
    if let Expression::CallExpression(call) = expr {
        for arg in &call.arguments {
            if let Argument::Identifier(ident) = arg {
                names.push(ident.name.as_str());
            }
        }
        collect_wrapped_identifiers(strip_wrappers(&call.callee), names);
    }
}

/// A class or function bound at the top level under `name`.
pub fn find_top_level<'t, 'a>(program: &'t Program<'a>, name: &str) -> Option<ComponentKind<'t, 'a>> {
    program.body.iter().find_map(|stmt| match stmt {
        Statement::ClassDeclaration(class) => class_named(class, name),
        Statement::FunctionDeclaration(func) => function_named(func, name),
        Statement::VariableDeclaration(decl) => declarator_component(&decl.declarations, name),
        Statement::ExportNamedDeclaration(export) => match &export.declaration {
            Some(Declaration::ClassDeclaration(class)) => class_named(class, name),
            Some(Declaration::FunctionDeclaration(func)) => function_named(func, name),
            Some(Declaration::VariableDeclaration(decl)) => {
                declarator_component(&decl.declarations, name)
            }
            _ => None,
        },
        _ => None,
    })
}

fn class_named<'t, 'a>(class: &'t Class<'a>, name: &str) -> Option<ComponentKind<'t, 'a>> {
    class
        .id
        .as_ref()
        .filter(|id| id.name == name)
        .map(|_| ComponentKind::ClassComponent(class))
}

fn function_named<'t, 'a>(func: &'t Function<'a>, name: &str) -> Option<ComponentKind<'t, 'a>> {
    func.id
        .as_ref()
        .filter(|id| id.name == name)
        .map(|_| ComponentKind::from_function(func))
}

fn declarator_component<'t, 'a>(
    declarations: &'t [oxc_ast::ast::VariableDeclarator<'a>],
    name: &str,
) -> Option<ComponentKind<'t, 'a>> {
    declarations.iter().find_map(|d| {
        let BindingPattern::BindingIdentifier(id) = &d.id else {
            return None;
        };
        if id.name != name {
            return None;
        }
        match d.init.as_ref().map(strip_wrappers) {
            Some(Expression::ClassExpression(class)) => Some(ComponentKind::ClassComponent(class)),
            Some(Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_)) => {
                Some(ComponentKind::FunctionComponent {
                    name: Some(id.name.as_str()),
                })
            }
            _ => None,
        }
    })
}

/// Peel parentheses and TypeScript-only wrappers off an expression.
pub fn strip_wrappers<'t, 'a>(expr: &'t Expression<'a>) -> &'t Expression<'a> {
    match expr {
        Expression::ParenthesizedExpression(inner) => strip_wrappers(&inner.expression),
        Expression::TSAsExpression(inner) => strip_wrappers(&inner.expression),
        Expression::TSSatisfiesExpression(inner) => strip_wrappers(&inner.expression),
        Expression::TSNonNullExpression(inner) => strip_wrappers(&inner.expression),
        _ => expr,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MEMBER / PROPERTY SHAPES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn property_key_name<'k>(key: &'k PropertyKey) -> Option<&'k str> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.as_str()),
        PropertyKey::StringLiteral(lit) => Some(lit.value.as_str()),
        _ => None,
    }
}

/// `this.<property>`
pub fn is_this_member(member: &StaticMemberExpression, property: &str) -> bool {
    matches!(member.object, Expression::ThisExpression(_)) && member.property.name == property
}

/// `<object>.<property>` where `object` is a plain identifier.
pub fn is_identifier_member(member: &StaticMemberExpression, object: &str) -> bool {
    matches!(&member.object, Expression::Identifier(ident) if ident.name == object)
}

/// Value of property `name` in an object literal, when written as `name: value`.
pub fn object_property<'t, 'a>(
    object: &'t ObjectExpression<'a>,
    name: &str,
) -> Option<&'t Expression<'a>> {
    object.properties.iter().find_map(|prop| match prop {
        ObjectPropertyKind::ObjectProperty(prop) if !prop.computed => {
            (property_key_name(&prop.key) == Some(name)).then_some(&prop.value)
        }
        _ => None,
    })
}

pub fn has_object_property(object: &ObjectExpression, name: &str) -> bool {
    object.properties.iter().any(|prop| match prop {
        ObjectPropertyKind::ObjectProperty(prop) if !prop.computed => {
            property_key_name(&prop.key) == Some(name)
        }
        _ => false,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASS SHAPES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn class_fields<'t, 'a>(
    class: &'t Class<'a>,
    name: &'t str,
) -> impl Iterator<Item = &'t PropertyDefinition<'a>> + 't {
    class.body.body.iter().filter_map(move |element| match element {
        ClassElement::PropertyDefinition(prop)
            if !prop.computed && property_key_name(&prop.key) == Some(name) =>
        {
            Some(&**prop)
        }
        _ => None,
    })
}

pub fn find_method<'t, 'a>(class: &'t Class<'a>, name: &str) -> Option<&'t MethodDefinition<'a>> {
    class.body.body.iter().find_map(|element| match element {
        ClassElement::MethodDefinition(method)
            if !method.computed && property_key_name(&method.key) == Some(name) =>
        {
            Some(&**method)
        }
        _ => None,
    })
}

pub fn has_member(class: &Class, name: &str) -> bool {
    class_fields(class, name).next().is_some() || find_method(class, name).is_some()
}

/// `config = { ... }` / `static config = { ... }` holding an object literal.
pub fn config_fields<'t, 'a>(
    class: &'t Class<'a>,
) -> impl Iterator<Item = (&'t PropertyDefinition<'a>, &'t ObjectExpression<'a>)> + 't {
    class_fields(class, "config").filter_map(|prop| match prop.value.as_ref().map(strip_wrappers) {
        Some(Expression::ObjectExpression(object)) => Some((prop, &**object)),
        _ => None,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOP-LEVEL STATEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Top-level `<object>.<property> = <right>` statements.
pub fn member_assignments<'t, 'a>(
    program: &'t Program<'a>,
    property: &'t str,
) -> impl Iterator<Item = (&'t str, &'t ExpressionStatement<'a>, &'t AssignmentExpression<'a>)> + 't
{
    program.body.iter().filter_map(move |stmt| {
        let Statement::ExpressionStatement(expr_stmt) = stmt else {
            return None;
        };
        let Expression::AssignmentExpression(assign) = &expr_stmt.expression else {
            return None;
        };
        let AssignmentTarget::StaticMemberExpression(member) = &assign.left else {
            return None;
        };
        let Expression::Identifier(object) = &member.object else {
            return None;
        };
        (member.property.name == property).then_some((
            object.name.as_str(),
            &**expr_stmt,
            &**assign,
        ))
    })
}

/// Top-level `X.render(<App />, ...)` bootstrap call and the rendered
/// component name.
pub fn render_bootstrap<'t, 'a>(
    program: &'t Program<'a>,
) -> Option<(&'t ExpressionStatement<'a>, &'t str)> {
    program.body.iter().find_map(|stmt| {
        let Statement::ExpressionStatement(expr_stmt) = stmt else {
            return None;
        };
        let Expression::CallExpression(call) = &expr_stmt.expression else {
            return None;
        };
        let Expression::StaticMemberExpression(callee) = &call.callee else {
            return None;
        };
        if callee.property.name != "render" || !matches!(callee.object, Expression::Identifier(_))
        {
            return None;
        }
        let Some(Argument::JSXElement(element)) = call.arguments.first() else {
            return None;
        };
        let name = match &element.opening_element.name {
            JSXElementName::IdentifierReference(id) => id.name.as_str(),
            JSXElementName::Identifier(id) => id.name.as_str(),
            _ => return None,
        };
        Some((&**expr_stmt, name))
    })
}

pub fn top_level_classes<'t, 'a>(program: &'t Program<'a>) -> Vec<&'t Class<'a>> {
    program
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::ClassDeclaration(class) => Some(&**class),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;
    use oxc_allocator::Allocator;
    use std::path::PathBuf;

    fn resolve_name(code: &str) -> Option<String> {
        let allocator = Allocator::default();
        let path = PathBuf::from("index.jsx");
        let tree = parse(&allocator, code, &path).unwrap();
        match resolve_default_export(tree.program()) {
            DefaultExport::Component(kind) => kind.name().map(str::to_string),
            DefaultExport::Object(_) => Some("<object>".to_string()),
            DefaultExport::Missing => None,
            DefaultExport::Unresolved(reason) => Some(format!("unresolved: {reason}")),
        }
    }

    #[test]
    fn test_default_export_class_declaration() {
        assert_eq!(
            resolve_name("export default class Index extends Component {}"),
            Some("Index".to_string())
        );
    }

    #[test]
    fn test_default_export_identifier_to_arrow() {
        assert_eq!(
            resolve_name("const Index = () => <View />\nexport default Index"),
            Some("Index".to_string())
        );
    }

    #[test]
    fn test_default_export_through_hoc() {
        assert_eq!(
            resolve_name("class Index extends Component {}\nexport default connect(a => a)(Index)"),
            Some("Index".to_string())
        );
    }

    #[test]
    fn test_default_export_missing_and_unresolved() {
        assert_eq!(resolve_name("const a = 1"), None);
        assert!(resolve_name("import X from './x'\nexport default X")
            .unwrap()
            .starts_with("unresolved"));
    }

    #[test]
    fn test_render_bootstrap_target() {
        let allocator = Allocator::default();
        let path = PathBuf::from("app.jsx");
        let code = "class App extends Component {}\nTaro.render(<App />, document.getElementById('app'))\n";
        let tree = parse(&allocator, code, &path).unwrap();
        let (_, name) = render_bootstrap(tree.program()).unwrap();
        assert_eq!(name, "App");
    }
}
