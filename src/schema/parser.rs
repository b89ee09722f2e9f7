//! Definition signature parser.
//!
//! Reads `define` declarations out of manifest text and turns each signature
//! into a [`DefinitionSchema`]. Bodies are skipped (they only need to be
//! balanced) because compiling a declaration never evaluates them.

use std::collections::{BTreeMap, HashSet};

use pest::{
    error::{ErrorVariant, InputLocation},
    iterators::Pair,
    Parser,
};
use pest_derive::Parser;
use regex::Regex;

use crate::errors::{named_source, to_source_span, DefcheckError, DefcheckResult, SourceArc};
use crate::schema::{Bounds, DefinitionSchema, ParamSpec, ParamType};
use crate::value::Value;

#[derive(Parser)]
#[grammar = "schema/grammar.pest"]
struct ManifestParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses every `define` in `text`. `source_name` is used in diagnostics
/// (usually the file path).
pub fn parse_definitions(source_name: &str, text: &str) -> DefcheckResult<Vec<DefinitionSchema>> {
    let src = named_source(source_name, text);
    let mut pairs =
        ManifestParser::parse(Rule::file, text).map_err(|e| convert_parse_error(e, &src))?;
    let Some(file) = pairs.next() else {
        return Ok(vec![]);
    };

    let mut definitions: Vec<DefinitionSchema> = Vec::new();
    let mut names = HashSet::new();
    for pair in file.into_inner() {
        if pair.as_rule() != Rule::definition {
            continue;
        }
        let definition = build_definition(pair, &src)?;
        if !names.insert(definition.name.clone()) {
            return Err(DefcheckError::DuplicateDefinition {
                name: definition.name,
            });
        }
        definitions.push(definition);
    }
    Ok(definitions)
}

// ============================================================================
// SCHEMA BUILDERS
// ============================================================================

fn build_definition(pair: Pair<Rule>, src: &SourceArc) -> DefcheckResult<DefinitionSchema> {
    let mut name = String::new();
    let mut name_span = (0, 0);
    let mut params = Vec::new();
    let mut param_spans: Vec<(String, (usize, usize))> = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::def_name => {
                name = inner.as_str().to_string();
                name_span = (inner.as_span().start(), inner.as_span().end());
            }
            Rule::param_list => {
                for param in inner.into_inner() {
                    let span = (param.as_span().start(), param.as_span().end());
                    let spec = build_param(param, &name, src)?;
                    param_spans.push((spec.name.clone(), span));
                    params.push(spec);
                }
            }
            _ => {}
        }
    }

    DefinitionSchema::try_new(name.clone(), params).map_err(|issue| {
        // The last occurrence is the one a duplicate complaint should point at.
        let (start, end) = issue
            .param
            .as_ref()
            .and_then(|p| param_spans.iter().rev().find(|(n, _)| n == p))
            .map(|(_, span)| *span)
            .unwrap_or(name_span);
        DefcheckError::Schema {
            definition: name,
            message: issue.message,
            src: src.clone(),
            span: to_source_span(start, end),
            help: None,
        }
    })
}

fn build_param(pair: Pair<Rule>, definition: &str, src: &SourceArc) -> DefcheckResult<ParamSpec> {
    let mut ty = ParamType::Any;
    let mut name = String::new();
    let mut default = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::type_expr => ty = build_type(inner, definition, src)?,
            Rule::variable => name = inner.as_str().trim_start_matches('$').to_string(),
            Rule::literal => default = Some(build_literal(inner, definition, src)?),
            _ => {}
        }
    }

    Ok(ParamSpec { name, ty, default })
}

fn build_type(pair: Pair<Rule>, definition: &str, src: &SourceArc) -> DefcheckResult<ParamType> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let type_name = first_inner_of(inner.next(), src, span.start())?.as_str();
    let args: Vec<Pair<Rule>> = inner.filter_map(|arg| arg.into_inner().next()).collect();

    let fail = |message: String, help: Option<&str>| DefcheckError::Schema {
        definition: definition.to_string(),
        message,
        src: src.clone(),
        span: to_source_span(span.start(), span.end()),
        help: help.map(str::to_string),
    };

    let types_of = |args: Vec<Pair<Rule>>| -> DefcheckResult<Vec<ParamType>> {
        args.into_iter()
            .map(|arg| match arg.as_rule() {
                Rule::type_expr => build_type(arg, definition, src),
                _ => Err(fail(
                    format!("{} expects type arguments, found '{}'", type_name, arg.as_str()),
                    None,
                )),
            })
            .collect()
    };

    match type_name {
        "Any" | "Float" | "Numeric" | "Boolean" if !args.is_empty() => Err(fail(
            format!("{} does not take arguments", type_name),
            None,
        )),
        "Any" => Ok(ParamType::Any),
        "Float" => Ok(ParamType::Float),
        "Numeric" => Ok(ParamType::Numeric),
        "Boolean" => Ok(ParamType::Boolean),
        "String" => Ok(ParamType::String(build_bounds(&args).map_err(|m| fail(m, None))?)),
        "Integer" => Ok(ParamType::Integer(build_bounds(&args).map_err(|m| fail(m, None))?)),
        "Array" => match types_of(args)?.as_slice() {
            [] => Ok(ParamType::Array(Box::new(ParamType::Any))),
            [element] => Ok(ParamType::Array(Box::new(element.clone()))),
            _ => Err(fail("Array takes one element type".to_string(), None)),
        },
        "Hash" => match types_of(args)?.as_slice() {
            [] => Ok(ParamType::Hash(Box::new(ParamType::Any))),
            [ParamType::String(Bounds { min: None, max: None }) | ParamType::Any, value] => {
                Ok(ParamType::Hash(Box::new(value.clone())))
            }
            [ParamType::String(_), _] => Err(fail(
                "Hash key types cannot be bounded".to_string(),
                Some("write Hash[String, <value type>]"),
            )),
            [_, _] => Err(fail(
                "Hash keys must be String".to_string(),
                Some("write Hash[String, <value type>]"),
            )),
            _ => Err(fail("Hash takes a key type and a value type".to_string(), None)),
        },
        "Optional" => match types_of(args)?.as_slice() {
            [inner] => Ok(ParamType::Optional(Box::new(inner.clone()))),
            _ => Err(fail("Optional takes exactly one type".to_string(), None)),
        },
        "Variant" => {
            let types = types_of(args)?;
            if types.is_empty() {
                return Err(fail("Variant needs at least one type".to_string(), None));
            }
            Ok(ParamType::Variant(types))
        }
        "Enum" => {
            let mut choices = Vec::new();
            for arg in args {
                if arg.as_rule() != Rule::string {
                    return Err(fail("Enum takes string choices".to_string(), None));
                }
                choices.push(build_string(arg, definition, src)?);
            }
            if choices.is_empty() {
                return Err(fail("Enum needs at least one choice".to_string(), None));
            }
            Ok(ParamType::Enum(choices))
        }
        "Pattern" => {
            let mut patterns = Vec::new();
            for arg in args {
                if arg.as_rule() != Rule::regex {
                    return Err(fail("Pattern takes /regex/ arguments".to_string(), None));
                }
                let raw = arg.as_str();
                let body = raw[1..raw.len() - 1].replace("\\/", "/");
                let re = Regex::new(&body)
                    .map_err(|e| fail(format!("invalid regex /{}/: {}", body, e), None))?;
                patterns.push(re);
            }
            if patterns.is_empty() {
                return Err(fail("Pattern needs at least one regex".to_string(), None));
            }
            Ok(ParamType::Pattern(patterns))
        }
        other => Err(fail(
            format!("unknown type '{}'", other),
            Some("supported types: Any, String, Integer, Float, Numeric, Boolean, Array, Hash, Optional, Variant, Enum, Pattern"),
        )),
    }
}

fn build_bounds(args: &[Pair<Rule>]) -> Result<Bounds, String> {
    let bound = |arg: &Pair<Rule>| -> Result<Option<i64>, String> {
        match arg.as_rule() {
            Rule::kw_default => Ok(None),
            Rule::integer => arg
                .as_str()
                .parse::<i64>()
                .map(Some)
                .map_err(|e| format!("invalid bound '{}': {}", arg.as_str(), e)),
            _ => Err(format!("bounds must be integers, found '{}'", arg.as_str())),
        }
    };
    let bounds = match args {
        [] => Bounds::UNBOUNDED,
        [min] => Bounds {
            min: bound(min)?,
            max: None,
        },
        [min, max] => Bounds {
            min: bound(min)?,
            max: bound(max)?,
        },
        _ => return Err("expected at most two bounds".to_string()),
    };
    if let (Some(min), Some(max)) = (bounds.min, bounds.max) {
        if min > max {
            return Err(format!("minimum {} is greater than maximum {}", min, max));
        }
    }
    Ok(bounds)
}

// ============================================================================
// LITERALS
// ============================================================================

fn build_literal(pair: Pair<Rule>, definition: &str, src: &SourceArc) -> DefcheckResult<Value> {
    let start = pair.as_span().start();
    let inner = first_inner_of(pair.into_inner().next(), src, start)?;
    let span = inner.as_span();

    match inner.as_rule() {
        Rule::string => Ok(Value::String(build_string(inner, definition, src)?)),
        Rule::float => inner
            .as_str()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| invalid_literal(definition, e.to_string(), src, span)),
        Rule::integer => inner
            .as_str()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| invalid_literal(definition, e.to_string(), src, span)),
        Rule::boolean => Ok(Value::Boolean(inner.as_str() == "true")),
        Rule::undef => Ok(Value::Undef),
        Rule::array => inner
            .into_inner()
            .map(|item| build_literal(item, definition, src))
            .collect::<DefcheckResult<Vec<_>>>()
            .map(Value::Array),
        Rule::hash => {
            let mut map = BTreeMap::new();
            for entry in inner.into_inner() {
                let entry_start = entry.as_span().start();
                let mut parts = entry.into_inner();
                let key_pair = first_inner_of(parts.next(), src, entry_start)?;
                let key = match key_pair.into_inner().next() {
                    Some(k) if k.as_rule() == Rule::string => build_string(k, definition, src)?,
                    Some(k) => k.as_str().to_string(),
                    None => String::new(),
                };
                let value_pair = first_inner_of(parts.next(), src, entry_start)?;
                map.insert(key, build_literal(value_pair, definition, src)?);
            }
            Ok(Value::Hash(map))
        }
        _ => Err(invalid_literal(
            definition,
            format!("unexpected '{}'", inner.as_str()),
            src,
            span,
        )),
    }
}

/// Unescapes a quoted string. Double-quoted strings may not interpolate.
fn build_string(pair: Pair<Rule>, definition: &str, src: &SourceArc) -> DefcheckResult<String> {
    let span = pair.as_span();
    let quoted = first_inner_of(pair.into_inner().next(), src, span.start())?;
    let double = quoted.as_rule() == Rule::dq_string;
    let raw = quoted.into_inner().next().map(|p| p.as_str()).unwrap_or("");

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match (c, double) {
            ('\\', false) => match chars.next() {
                Some('\\') => out.push('\\'),
                Some('\'') => out.push('\''),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            ('\\', true) => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('s') => out.push(' '),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            ('$', true) => {
                return Err(DefcheckError::Schema {
                    definition: definition.to_string(),
                    message: "string interpolation is not supported in defaults".to_string(),
                    src: src.clone(),
                    span: to_source_span(span.start(), span.end()),
                    help: Some("use a single-quoted string or escape the '$'".to_string()),
                })
            }
            (c, _) => out.push(c),
        }
    }
    Ok(out)
}

// ============================================================================
// ERROR HELPERS
// ============================================================================

fn invalid_literal(
    definition: &str,
    message: String,
    src: &SourceArc,
    span: pest::Span<'_>,
) -> DefcheckError {
    DefcheckError::Schema {
        definition: definition.to_string(),
        message: format!("invalid literal: {}", message),
        src: src.clone(),
        span: to_source_span(span.start(), span.end()),
        help: None,
    }
}

/// The grammar guarantees most inner pairs; this turns a broken guarantee into
/// a syntax error instead of a panic.
fn first_inner_of<'a>(
    pair: Option<Pair<'a, Rule>>,
    src: &SourceArc,
    at: usize,
) -> DefcheckResult<Pair<'a, Rule>> {
    pair.ok_or_else(|| DefcheckError::Syntax {
        message: "incomplete construct".to_string(),
        src: src.clone(),
        span: to_source_span(at, at),
    })
}

fn convert_parse_error(error: pest::error::Error<Rule>, src: &SourceArc) -> DefcheckError {
    let (start, end) = match error.location {
        InputLocation::Pos(pos) => (pos, pos),
        InputLocation::Span((start, end)) => (start, end),
    };
    let message = match &error.variant {
        ErrorVariant::ParsingError { positives, .. } if positives.contains(&Rule::body) => {
            "unbalanced braces in definition body".to_string()
        }
        ErrorVariant::ParsingError { positives, .. } if positives.contains(&Rule::variable) => {
            "expected a parameter like `String $name`".to_string()
        }
        ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
            let expected: Vec<&str> = positives.iter().map(|rule| describe_rule(*rule)).collect();
            format!("expected {}", expected.join(" or "))
        }
        ErrorVariant::ParsingError { .. } => "unexpected input".to_string(),
        ErrorVariant::CustomError { message } => message.clone(),
    };
    DefcheckError::Syntax {
        message,
        src: src.clone(),
        span: to_source_span(start, end),
    }
}

fn describe_rule(rule: Rule) -> &'static str {
    match rule {
        Rule::file | Rule::definition | Rule::other | Rule::EOI => "a top-level declaration",
        Rule::kw_define => "`define`",
        Rule::def_name | Rule::ident => "a definition name",
        Rule::param_list => "a parameter list",
        Rule::param => "a parameter",
        Rule::type_expr | Rule::type_name | Rule::type_arg => "a type",
        Rule::literal
        | Rule::string
        | Rule::float
        | Rule::integer
        | Rule::boolean
        | Rule::undef
        | Rule::array
        | Rule::hash => "a literal",
        Rule::hash_entry | Rule::hash_key => "a hash entry",
        _ => "valid syntax",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(text: &str) -> DefinitionSchema {
        let mut defs = parse_definitions("test.pp", text).unwrap();
        assert_eq!(defs.len(), 1);
        defs.remove(0)
    }

    #[test]
    fn parses_typed_parameters_and_defaults() {
        let def = parse_one(
            r#"
            # installs an agent
            define puppet_nonroot (
              String $user,
              Integer[60] $run_interval = 1800,
              Optional[String] $home = undef,
              Boolean $enabled = true,
            ) {
              exec { "install ${user}": command => '/bin/true' }
            }
            "#,
        );
        assert_eq!(def.name, "puppet_nonroot");
        assert_eq!(def.params.len(), 4);
        assert!(def.params[0].is_required());
        assert_eq!(def.params[1].default, Some(Value::Integer(1800)));
        assert_eq!(def.params[1].ty.to_string(), "Integer[60]");
        assert_eq!(def.params[2].default, Some(Value::Undef));
        assert_eq!(def.params[3].default, Some(Value::Boolean(true)));
    }

    #[test]
    fn untyped_parameters_are_any() {
        let def = parse_one("define a::b ($x, $y = 'z') { }");
        assert_eq!(def.name, "a::b");
        assert!(matches!(def.params[0].ty, ParamType::Any));
        assert_eq!(def.params[1].default, Some(Value::from("z")));
    }

    #[test]
    fn definitions_without_parameter_list() {
        let def = parse_one("define noop { }");
        assert!(def.params.is_empty());
    }

    #[test]
    fn collection_defaults() {
        let def = parse_one(
            "define c (Array[String] $a = ['x', 'y'], Hash $h = { 'k' => 1, other => [] }) {}",
        );
        assert_eq!(
            def.params[0].default,
            Some(Value::Array(vec![Value::from("x"), Value::from("y")]))
        );
        let Some(Value::Hash(map)) = &def.params[1].default else {
            panic!("expected hash default");
        };
        assert_eq!(map.get("k"), Some(&Value::Integer(1)));
        assert_eq!(map.get("other"), Some(&Value::Array(vec![])));
    }

    #[test]
    fn escapes_in_strings() {
        let def = parse_one(r#"define s ($a = 'it\'s', $b = "tab\there\$") {}"#);
        assert_eq!(def.params[0].default, Some(Value::from("it's")));
        assert_eq!(def.params[1].default, Some(Value::from("tab\there$")));
    }

    #[test]
    fn interpolation_is_rejected() {
        let err = parse_definitions("t.pp", r#"define s ($a = "/home/${user}") {}"#).unwrap_err();
        assert!(matches!(err, DefcheckError::Schema { .. }));
    }

    #[test]
    fn enum_pattern_and_variant_types() {
        let def = parse_one(
            "define t (Enum['present', 'absent'] $ensure, Pattern[/^\\d+m$/] $every, Variant[Integer, String[1]] $id) {}",
        );
        assert_eq!(def.params[0].ty.to_string(), "Enum['present', 'absent']");
        assert!(def.params[1].ty.accepts(&Value::from("30m")));
        assert_eq!(def.params[2].ty.to_string(), "Variant[Integer, String[1]]");
    }

    #[test]
    fn unknown_types_are_schema_errors() {
        let err = parse_definitions("t.pp", "define t (Stringy $a) {}").unwrap_err();
        let DefcheckError::Schema { message, .. } = err else {
            panic!("expected schema error");
        };
        assert!(message.contains("unknown type 'Stringy'"));
    }

    #[test]
    fn ill_typed_default_points_at_parameter() {
        let text = "define t (Integer $a = 'soon') {}";
        let err = parse_definitions("t.pp", text).unwrap_err();
        let DefcheckError::Schema { span, .. } = err else {
            panic!("expected schema error");
        };
        assert_eq!(&text[span.offset()..span.offset() + span.len()], "Integer $a = 'soon'");
    }

    #[test]
    fn unbalanced_body_is_a_syntax_error() {
        let err = parse_definitions("t.pp", "define t ($a) { if $a { }").unwrap_err();
        assert!(matches!(err, DefcheckError::Syntax { .. }));
    }

    #[test]
    fn duplicate_definitions_in_one_file() {
        let err = parse_definitions("t.pp", "define t {} define t {}").unwrap_err();
        assert!(matches!(err, DefcheckError::DuplicateDefinition { .. }));
    }

    #[test]
    fn other_top_level_blocks_are_skipped() {
        let defs = parse_definitions(
            "init.pp",
            r#"
            class site::agent (String $master = 'puppet', Hash $opts = {}) inherits site {
              define_helper { 'x': }
            }
            node 'agent01.example.com' { include site::agent }
            Exec { path => ['/bin', '/usr/bin'] }
            $label = "define nothing { }"
            package { 'puppet-agent': ensure => installed } -> service { 'puppet': }
            define site::account (String $login) { }
            undefined_function('define')
            "#,
        )
        .unwrap();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["site::account"]);
    }

    #[test]
    fn file_without_definitions_is_empty() {
        assert!(parse_definitions("init.pp", "class site { }\n").unwrap().is_empty());
    }

    #[test]
    fn syntax_errors_name_what_was_expected() {
        let err = parse_definitions("t.pp", "define t (String) { }").unwrap_err();
        let DefcheckError::Syntax { message, .. } = err else {
            panic!("expected syntax error");
        };
        assert_ne!(message, "expected file");
        assert!(!message.contains("file"), "{}", message);
    }

    #[test]
    fn bounded_hash_keys_are_rejected() {
        let err = parse_definitions("t.pp", "define t (Hash[String[1], Integer] $h) {}").unwrap_err();
        let DefcheckError::Schema { message, .. } = err else {
            panic!("expected schema error");
        };
        assert!(message.contains("cannot be bounded"), "{}", message);
    }

    #[test]
    fn displayed_defaults_read_back() {
        for original in [Value::from("C:\\temp\\"), Value::from("it's"), Value::from("a\\'b")] {
            let text = format!("define t ($a = {}) {{}}", original);
            let def = parse_one(&text);
            assert_eq!(def.params[0].default.as_ref(), Some(&original), "{}", text);
        }
    }

    #[test]
    fn braces_in_body_strings_are_ignored() {
        let def = parse_one("define t { $x = '}' # }\n notify { \"{\": } }");
        assert_eq!(def.name, "t");
    }
}
