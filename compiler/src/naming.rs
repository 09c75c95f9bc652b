//! Naming policy.
//!
//! Every identifier the compiler derives from a declared name goes through
//! this module, so emitters and the runtime can rely on one set of rules.

use crate::model::Transport;

pub use pipeworks_schema::utils::{derive_outer_container, to_pascal_case};

/// Services bound to a step must start with this.
pub const SERVICE_PREFIX: &str = "Process";
pub const SERVICE_SUFFIX: &str = "Service";
/// The only method ever bound on a step service.
pub const REMOTE_METHOD: &str = "remoteProcess";
pub const SIDE_EFFECT_SUFFIX: &str = "SideEffect";
/// Aspect applied by the runtime cache policy rather than by inserted steps.
pub const CLIENT_EXCLUDED_ASPECT: &str = "cache";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_BASE_PORT: u16 = 8443;

/// Tokens that carry no meaning when matching names against each other.
const NOISE_TOKENS: &[&str] = &[
    "process", "grpc", "rest", "client", "step", "service", "side", "effect",
];

/// Lower-case ASCII alphanumerics only: `Step-One_to.One` -> `steponetoone`.
pub fn normalize_token(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Empty, `void` and `Void` all mean "no type".
pub fn is_void_type(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("void") || trimmed == "()"
}

/// Split camelCase, PascalCase, snake_case and kebab-case into words.
///
/// Acronyms stay together (`HTTPServer` -> `HTTP`, `Server`) and digits
/// stick to the word before them.
pub fn split_words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

pub fn to_kebab_case(s: &str) -> String {
    join_lower(s, "-")
}

pub fn to_snake_case(s: &str) -> String {
    join_lower(s, "_")
}

fn join_lower(s: &str, separator: &str) -> String {
    split_words(s)
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Last dotted segment: `acme.orders.Order` -> `Order`.
pub fn simple_name(fq: &str) -> &str {
    let trimmed = fq.trim_start_matches('.');
    trimmed.rsplit('.').next().unwrap_or(trimmed)
}

/// Everything before the last dot, if there is a dot.
pub fn namespace_of(fq: &str) -> Option<&str> {
    let trimmed = fq.trim_start_matches('.');
    trimmed
        .rsplit_once('.')
        .map(|(ns, _)| ns)
        .filter(|ns| !ns.is_empty())
}

pub fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// `ProcessCustomerService` -> `Customer`.
///
/// Names that are nothing but the prefix and suffix are returned unchanged.
pub fn step_base_name(service_name: &str) -> &str {
    let stripped = service_name
        .strip_prefix(SERVICE_PREFIX)
        .unwrap_or(service_name);
    let stripped = stripped.strip_suffix(SERVICE_SUFFIX).unwrap_or(stripped);
    if stripped.is_empty() {
        service_name
    } else {
        stripped
    }
}

/// Service name derived from a step name: `validate-order` -> `ProcessValidateOrderService`.
pub fn service_name_for_step(step_name: &str) -> String {
    let pascal = to_pascal_case(step_name);
    let pascal = pascal.strip_prefix(SERVICE_PREFIX).unwrap_or(&pascal);
    let pascal = pascal.strip_suffix(SERVICE_SUFFIX).unwrap_or(pascal);
    format!("{}{}{}", SERVICE_PREFIX, pascal, SERVICE_SUFFIX)
}

/// Client adapter for a step service:
/// `acme`, `ProcessCustomerService` -> `acme.ProcessCustomerGrpcClientStep`.
pub fn client_step_identifier(namespace: &str, service_name: &str, transport: Transport) -> String {
    let stem = service_name
        .strip_suffix(SERVICE_SUFFIX)
        .filter(|s| !s.is_empty())
        .unwrap_or(service_name);
    qualify(namespace, &format!("{}{}", stem, transport.adapter_suffix()))
}

/// Simple type name with namespace and generic arguments dropped:
/// `.acme.Customer` -> `Customer`, `List<acme.Item>` -> `List`.
pub fn normalize_type_name(type_name: &str) -> String {
    let head = type_name.split('<').next().unwrap_or(type_name);
    let head = head.trim().trim_end_matches("[]");
    simple_name(head).to_string()
}

/// Synthetic step inserted for an aspect:
/// `acme`, `persistence`, `acme.Customer` ->
/// `acme.PersistenceCustomerSideEffectGrpcClientStep`.
pub fn side_effect_identifier(
    namespace: &str,
    aspect: &str,
    type_name: &str,
    transport: Transport,
) -> String {
    qualify(
        namespace,
        &format!(
            "{}{}{}{}",
            to_pascal_case(aspect),
            to_pascal_case(&normalize_type_name(type_name)),
            SIDE_EFFECT_SUFFIX,
            transport.adapter_suffix()
        ),
    )
}

/// True for identifiers built by [`side_effect_identifier`]: `SideEffect`
/// directly followed by an adapter suffix at the end of the simple name.
pub fn is_side_effect_identifier(identifier: &str) -> bool {
    let simple = simple_name(identifier);
    [Transport::Grpc, Transport::Rest].iter().any(|transport| {
        simple
            .strip_suffix(transport.adapter_suffix())
            .is_some_and(|head| head.ends_with(SIDE_EFFECT_SUFFIX))
    })
}

/// Default module for a step: `ProcessCustomerService` -> `customer-svc`.
pub fn default_step_module(service_name: &str) -> String {
    format!("{}-svc", to_kebab_case(step_base_name(service_name)))
}

/// Default module for a side-effect step: `persistence`, `Customer` -> `persistence-customer-svc`.
pub fn default_side_effect_module(aspect: &str, type_name: &str) -> String {
    format!(
        "{}-{}-svc",
        to_kebab_case(aspect),
        to_kebab_case(&normalize_type_name(type_name))
    )
}

/// Client name in the placement table: role token plus the kebab-cased name.
pub fn client_name(role_token: &str, name: &str) -> String {
    format!("{}-{}", role_token, to_kebab_case(name))
}

fn meaningful_tokens(s: &str) -> Vec<String> {
    split_words(simple_name(s))
        .into_iter()
        .map(|w| w.to_ascii_lowercase())
        .filter(|w| !NOISE_TOKENS.contains(&w.as_str()))
        .collect()
}

/// Index of the candidate sharing the most meaningful tokens with `name`.
///
/// Ties are broken by the total length of the shared tokens, then by
/// candidate order. Returns `None` when nothing shares a token.
pub fn best_token_match<S: AsRef<str>>(name: &str, candidates: &[S]) -> Option<usize> {
    let wanted = meaningful_tokens(name);
    if wanted.is_empty() {
        return None;
    }

    let mut best: Option<(usize, usize, usize)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let tokens = meaningful_tokens(candidate.as_ref());
        let shared: Vec<&String> = wanted.iter().filter(|w| tokens.contains(w)).collect();
        if shared.is_empty() {
            continue;
        }
        let score = (shared.len(), shared.iter().map(|t| t.len()).sum::<usize>());
        let better = match best {
            None => true,
            Some((_, count, length)) => score > (count, length),
        };
        if better {
            best = Some((index, score.0, score.1));
        }
    }
    best.map(|(index, _, _)| index)
}
