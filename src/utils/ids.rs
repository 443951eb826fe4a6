/// Declares an opaque, process-unique identifier type.
///
/// Every value created with `new()` holds an id that no other live value of
/// the same type holds. The id is released when the value is dropped and may
/// then be handed out again, so identifiers must never be compared across
/// lifetimes of their owners.
macro_rules! id_gen {
    ($(#[$attr:meta])* $vis:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Debug, PartialEq, Eq, Hash)]
        $vis struct $name(usize);

        impl $name {
            fn id_data() -> &'static std::sync::Mutex<(std::collections::HashSet<usize>, usize)> {
                static ID_DATA: once_cell::sync::Lazy<
                    std::sync::Mutex<(std::collections::HashSet<usize>, usize)>,
                > = once_cell::sync::Lazy::new(|| {
                    std::sync::Mutex::new((std::collections::HashSet::new(), 0))
                });
                &ID_DATA
            }

            /// Allocate a fresh identifier
            pub(crate) fn new() -> Self {
                let (in_use, counter) = &mut *Self::id_data().lock().unwrap();

                if in_use.len() == usize::MAX {
                    panic!("Out of {} values", stringify!($name));
                }

                while !in_use.insert(*counter) {
                    *counter = counter.wrapping_add(1);
                }

                let id = *counter;
                *counter = counter.wrapping_add(1);
                $name(id)
            }

            /// Raw numeric value, for logging
            pub fn as_raw(&self) -> usize {
                self.0
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                Self::id_data().lock().unwrap().0.remove(&self.0);
            }
        }
    };
}

pub(crate) use id_gen;

#[cfg(test)]
mod tests {
    crate::utils::ids::id_gen! {
        struct TestId;
    }

    #[test]
    fn ids_are_unique_while_held() {
        let a = TestId::new();
        let b = TestId::new();
        assert_ne!(a, b);
        assert_ne!(a.as_raw(), b.as_raw());
    }

    crate::utils::ids::id_gen! {
        struct DropId;
    }

    #[test]
    fn dropping_releases_the_id() {
        let raw = DropId::new().as_raw();
        assert!(!DropId::id_data().lock().unwrap().0.contains(&raw));
    }
}
