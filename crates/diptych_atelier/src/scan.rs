//! Structural candidate scan.
//!
//! Walks a parsed program once and records, as owned snapshots:
//! - candidate calls that may terminate a method chain or call a factory
//! - inner calls of method chains, keyed by span, so a chain can be walked
//!   from its outermost call down without another traversal
//! - the variable declarator each call initializes
//! - template elements that may be `<ClientOnly>`
//!
//! When the only possible kind is declared at the top level, a fast path
//! visits just the top-level declarations whose initializer is a chain
//! candidate.

use diptych_carton::{CompactString, FxHashMap, FxHashSet};
use diptych_croquis::{chain_kinds, is_direct_call_factory, unwrap_expression, Expr, KindSet};
use oxc_ast::ast::{
    Argument, BindingPatternKind, CallExpression, Declaration, Expression, JSXElement,
    JSXElementName, Program, Statement, VariableDeclaration, VariableDeclarator,
};
use oxc_ast::visit::walk;
use oxc_ast::Visit;
use oxc_span::{GetSpan, Span};

/// First argument of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgInfo {
    pub span: Span,
    pub is_spread: bool,
}

/// Owned snapshot of one call expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSnapshot {
    pub span: Span,
    pub callee_span: Span,
    /// Property name when the callee is `object.name`.
    pub method: Option<CompactString>,
    /// Span of `object` when the callee is a member access.
    pub object: Option<Span>,
    /// The unwrapped `object` is itself a call.
    pub object_is_call: bool,
    pub first_arg: Option<ArgInfo>,
}

impl CallSnapshot {
    fn new(call: &CallExpression<'_>) -> Self {
        let (method, object) = match unwrap_expression(&call.callee) {
            Expression::StaticMemberExpression(member) => (
                Some(CompactString::from(member.property.name.as_str())),
                Some(unwrap_expression(&member.object)),
            ),
            Expression::ComputedMemberExpression(member) => {
                (None, Some(unwrap_expression(&member.object)))
            }
            _ => (None, None),
        };
        Self {
            span: call.span,
            callee_span: call.callee.span(),
            method,
            object: object.map(GetSpan::span),
            object_is_call: matches!(object, Some(Expression::CallExpression(_))),
            first_arg: call.arguments.first().map(|arg| ArgInfo {
                span: arg.span(),
                is_spread: matches!(arg, Argument::SpreadElement(_)),
            }),
        }
    }
}

/// The variable declarator a call initializes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaratorSite {
    /// `None` for destructuring patterns.
    pub name: Option<CompactString>,
    pub id_span: Span,
    /// Offset a new statement can be inserted at so it precedes the
    /// declaration (and its `export` keyword, if any).
    pub insert_at: u32,
}

/// One segment of a method chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSlot {
    pub call: Span,
    /// The receiver of the method, i.e. the chain without this segment.
    pub object: Span,
    pub first_arg: Option<ArgInfo>,
}

/// Segments of a method chain, by method name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodChain {
    pub middleware: Option<ChainSlot>,
    pub input_validator: Option<ChainSlot>,
    pub handler: Option<ChainSlot>,
    pub server: Option<ChainSlot>,
    pub client: Option<ChainSlot>,
}

impl MethodChain {
    fn slot_mut(&mut self, method: &str) -> Option<&mut Option<ChainSlot>> {
        match method {
            "middleware" => Some(&mut self.middleware),
            "inputValidator" => Some(&mut self.input_validator),
            "handler" => Some(&mut self.handler),
            "server" => Some(&mut self.server),
            "client" => Some(&mut self.client),
            _ => None,
        }
    }
}

/// A call that may need rewriting.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub call: CallSnapshot,
    /// Shape of the call for resolution.
    pub expr: Expr,
    pub chain: MethodChain,
    pub declarator: Option<DeclaratorSite>,
}

/// A JSX element with a plain identifier name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSite {
    pub name: CompactString,
    pub span: Span,
    pub opening_span: Span,
    pub self_closing: bool,
}

/// Everything the scan found.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub candidates: Vec<CallSite>,
    pub templates: Vec<TemplateSite>,
    /// Inner calls of method chains, by span.
    pub inner_calls: FxHashMap<Span, CallSnapshot>,
}

/// Scan `program` for candidates of `kinds`.
pub fn scan_program(program: &Program<'_>, kinds: KindSet) -> ScanResult {
    let fast = kinds.is_top_level_only();
    let mut scanner = Scanner::new(kinds, fast);

    for stmt in &program.body {
        let declaration = match stmt {
            Statement::VariableDeclaration(decl) => Some((decl, false)),
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(Declaration::VariableDeclaration(decl)) => Some((decl, true)),
                _ => None,
            },
            _ => None,
        };

        if let Some((decl, exported)) = declaration {
            if fast && !decl.declarations.iter().any(|d| scanner.is_chain_init(d)) {
                continue;
            }
            for declarator in &decl.declarations {
                if let Some(Expression::CallExpression(call)) =
                    declarator.init.as_ref().map(unwrap_expression)
                {
                    scanner.top_level_inits.insert(call.span);
                }
            }
            scanner.exported_declaration = exported.then(|| (decl.span, stmt.span().start));
        } else if fast {
            continue;
        }

        scanner.visit_statement(stmt);
        scanner.exported_declaration = None;
    }

    scanner.finish()
}

struct Scanner {
    kinds: KindSet,
    check_direct_calls: bool,
    check_templates: bool,
    /// Calls initializing a top-level declarator.
    top_level_inits: FxHashSet<Span>,
    /// Calls already known to be the receiver of a chained call.
    inner_spans: FxHashSet<Span>,
    /// `(declaration span, export statement start)` of the current statement.
    exported_declaration: Option<(Span, u32)>,
    insert_points: Vec<u32>,
    declarators: FxHashMap<Span, DeclaratorSite>,
    candidates: Vec<(CallSnapshot, Expr)>,
    inner_calls: FxHashMap<Span, CallSnapshot>,
    templates: Vec<TemplateSite>,
}

impl Scanner {
    fn new(kinds: KindSet, fast: bool) -> Self {
        Self {
            kinds,
            check_direct_calls: !fast && kinds.needs_direct_call_detection(),
            check_templates: !fast && kinds.needs_template_detection(),
            top_level_inits: FxHashSet::default(),
            inner_spans: FxHashSet::default(),
            exported_declaration: None,
            insert_points: Vec::new(),
            declarators: FxHashMap::default(),
            candidates: Vec::new(),
            inner_calls: FxHashMap::default(),
            templates: Vec::new(),
        }
    }

    fn is_chain_init(&self, declarator: &VariableDeclarator<'_>) -> bool {
        match declarator.init.as_ref().map(unwrap_expression) {
            Some(Expression::CallExpression(call)) => self.is_method_chain_candidate(call),
            _ => false,
        }
    }

    /// `x.method(...)` where `method` terminates a chain of a wanted kind.
    fn is_method_chain_candidate(&self, call: &CallExpression<'_>) -> bool {
        match unwrap_expression(&call.callee) {
            Expression::StaticMemberExpression(member) => {
                chain_kinds(member.property.name.as_str())
                    .iter()
                    .any(|kind| self.kinds.has(*kind))
            }
            _ => false,
        }
    }

    fn is_direct_call_candidate(&self, call: &CallExpression<'_>) -> bool {
        let callee = unwrap_expression(&call.callee);
        let simple = match callee {
            Expression::Identifier(_) => true,
            Expression::StaticMemberExpression(member) => {
                matches!(unwrap_expression(&member.object), Expression::Identifier(_))
            }
            _ => false,
        };
        if simple && self.top_level_inits.contains(&call.span) {
            return true;
        }
        let name = match callee {
            Expression::Identifier(ident) => Some(ident.name.as_str()),
            Expression::StaticMemberExpression(member) => Some(member.property.name.as_str()),
            _ => None,
        };
        name.is_some_and(is_direct_call_factory)
    }

    fn finish(self) -> ScanResult {
        let Scanner {
            candidates,
            mut declarators,
            inner_calls,
            templates,
            ..
        } = self;

        let candidates = candidates
            .into_iter()
            .map(|(call, expr)| CallSite {
                chain: build_method_chain(&call, &inner_calls),
                declarator: declarators.remove(&call.span),
                call,
                expr,
            })
            .collect();

        ScanResult {
            candidates,
            templates,
            inner_calls,
        }
    }
}

impl<'a> Visit<'a> for Scanner {
    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        let insert_at = match self.exported_declaration {
            Some((span, export_start)) if span == decl.span => export_start,
            _ => decl.span.start,
        };
        self.insert_points.push(insert_at);
        walk::walk_variable_declaration(self, decl);
        self.insert_points.pop();
    }

    fn visit_variable_declarator(&mut self, declarator: &VariableDeclarator<'a>) {
        if let Some(Expression::CallExpression(call)) =
            declarator.init.as_ref().map(unwrap_expression)
        {
            let name = match &declarator.id.kind {
                BindingPatternKind::BindingIdentifier(id) => Some(id.name.as_str().into()),
                _ => None,
            };
            self.declarators.insert(
                call.span,
                DeclaratorSite {
                    name,
                    id_span: declarator.id.span(),
                    insert_at: self
                        .insert_points
                        .last()
                        .copied()
                        .unwrap_or(declarator.span.start),
                },
            );
        }
        walk::walk_variable_declarator(self, declarator);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        let snapshot = CallSnapshot::new(call);
        if snapshot.object_is_call {
            if let Some(object) = snapshot.object {
                self.inner_spans.insert(object);
            }
        }

        if self.inner_spans.contains(&call.span) {
            self.inner_calls.insert(call.span, snapshot);
        } else if self.is_method_chain_candidate(call)
            || (self.check_direct_calls && self.is_direct_call_candidate(call))
        {
            let expr = Expr::Call {
                callee: Box::new(Expr::from_oxc(&call.callee)),
            };
            self.candidates.push((snapshot, expr));
        }

        walk::walk_call_expression(self, call);
    }

    fn visit_jsx_element(&mut self, element: &JSXElement<'a>) {
        if self.check_templates {
            let name = match &element.opening_element.name {
                JSXElementName::Identifier(ident) => Some(ident.name.as_str()),
                JSXElementName::IdentifierReference(ident) => Some(ident.name.as_str()),
                _ => None,
            };
            if let Some(name) = name {
                self.templates.push(TemplateSite {
                    name: name.into(),
                    span: element.span,
                    opening_span: element.opening_element.span,
                    self_closing: element.opening_element.self_closing,
                });
            }
        }
        walk::walk_jsx_element(self, element);
    }
}

/// Walk from `call` down through the receivers of the chain, recording the
/// segments with known method names. The outermost segment of a name wins.
fn build_method_chain(
    call: &CallSnapshot,
    inner_calls: &FxHashMap<Span, CallSnapshot>,
) -> MethodChain {
    let mut chain = MethodChain::default();
    let mut current = call;
    loop {
        let Some(object) = current.object else {
            break;
        };
        if let Some(slot) = current.method.as_deref().and_then(|m| chain.slot_mut(m)) {
            if slot.is_none() {
                *slot = Some(ChainSlot {
                    call: current.span,
                    object,
                    first_arg: current.first_arg.clone(),
                });
            }
        }
        if !current.object_is_call {
            break;
        }
        match inner_calls.get(&object) {
            Some(inner) => current = inner,
            None => break,
        }
    }
    chain
}
