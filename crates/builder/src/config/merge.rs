use std::collections::BTreeMap;

/// Folds a conditional section into the section it belongs to.
///
/// Lists append, maps insert (replacing existing keys), booleans are OR-ed
/// and optional scalars override only when set.
pub trait Merge {
    fn merge(&mut self, other: Self);
}

impl<T> Merge for Vec<T> {
    fn merge(&mut self, other: Self) {
        self.extend(other);
    }
}

impl Merge for bool {
    fn merge(&mut self, other: Self) {
        *self |= other;
    }
}

impl<T> Merge for Option<T> {
    fn merge(&mut self, other: Self) {
        if other.is_some() {
            *self = other;
        }
    }
}

impl<V> Merge for BTreeMap<String, V> {
    fn merge(&mut self, other: Self) {
        self.extend(other);
    }
}

/// Implements [`Merge`] field by field.
macro_rules! merge_fields {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::config::merge::Merge for $ty {
            fn merge(&mut self, other: Self) {
                $( $crate::config::merge::Merge::merge(&mut self.$field, other.$field); )*
            }
        }
    };
}

pub(crate) use merge_fields;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        let mut flag = false;
        flag.merge(true);
        flag.merge(false);
        assert!(flag);

        let mut level = Some(2);
        level.merge(None);
        assert_eq!(level, Some(2));
        level.merge(Some(3));
        assert_eq!(level, Some(3));
    }

    #[test]
    fn test_collections() {
        let mut list = vec!["a"];
        list.merge(vec!["b", "a"]);
        assert_eq!(list, ["a", "b", "a"]);

        let mut map = BTreeMap::from([("X".to_owned(), "1".to_owned()), ("Y".to_owned(), "2".to_owned())]);
        map.merge(BTreeMap::from([("Y".to_owned(), "3".to_owned()), ("Z".to_owned(), String::new())]));
        assert_eq!(map["X"], "1");
        assert_eq!(map["Y"], "3");
        assert_eq!(map["Z"], "");
    }
}
