#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

#[macro_export]
macro_rules! selector {
    ($css:literal) => {{
        static SEL: once_cell::sync::Lazy<scraper::Selector> =
            once_cell::sync::Lazy::new(|| scraper::Selector::parse($css).unwrap());
        &*SEL
    }};
}

/// Declare one level of a [`RuleSet`](crate::RuleSet).
///
/// ```text
/// rule_set! {
///     name: "article",
///     context: HtmlDocument,          // optional, pins the context type
///     extras: Value,                  // optional, pins the extras type
///     extends: page::rules(),         // optional parent level
///     rules: {
///         byline => |cx| cx.doc().text(".byline"),
///         slug as "id" => |cx| ...,   // stored under "id"
///         raw as hidden => |cx| ...,  // memoized, never emitted
///     },
/// }
/// ```
#[macro_export]
macro_rules! rule_set {
    (
        name: $name:expr
        $(, context: $ctx:ty)?
        $(, extras: $ext:ty)?
        $(, extends: $parent:expr)?
        , rules: { $( $rule:ident $(as $vis:tt)? => $body:expr ),* $(,)? }
        $(,)?
    ) => {{
        let set = $crate::RuleSet::new($name);
        $(let set: $crate::RuleSet<$ctx, _> = set;)?
        $(let set: $crate::RuleSet<_, $ext> = set;)?
        $(let set = set.extends($parent);)?
        $( let set = $crate::rule_set!(@rule set, $rule, [$($vis)?], $body); )*
        set
    }};
    (@rule $set:ident, $rule:ident, [], $body:expr) => {
        $set.rule(stringify!($rule), $body)
    };
    (@rule $set:ident, $rule:ident, [hidden], $body:expr) => {
        $set.hidden_rule(stringify!($rule), $body)
    };
    (@rule $set:ident, $rule:ident, [$field:literal], $body:expr) => {
        $set.rule_as(stringify!($rule), $field, $body)
    };
}
