use std::error::Error;

/// Boxed static error type
pub type Err = Box<dyn Error + 'static>;

/// Collects the distinct items of an iterator, keeping the order in which they
/// were first seen. Will clone the elements.
///
/// ```
/// let v = vec![3, 1, 3, 2, 1];
///
/// assert_eq!(treecyk::utils::distinct_in_order(v.iter()), vec![3, 1, 2]);
/// ```
pub fn distinct_in_order<'a, T, I>(items: I) -> Vec<T>
where
  T: Clone + PartialEq + 'a,
  I: IntoIterator<Item = &'a T>,
{
  let mut seen: Vec<T> = Vec::new();
  for item in items {
    if !seen.contains(item) {
      seen.push(item.clone());
    }
  }
  seen
}

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: regex::Regex = regex::Regex::new($pattern).unwrap();
    }
  };
}
