use serde::Serialize;

/// Macro to generate a positional label enum: as_str + Display + ordered `ALL`.
///
/// Variant order is the classifier's output order. `ALL` and `COUNT` are
/// derived from the same list, so they cannot drift apart.
macro_rules! label_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];
            pub const COUNT: usize = Self::ALL.len();

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            /// Position of this label in the model output vector.
            pub fn index(&self) -> usize {
                *self as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

label_enum!(DementiaClass {
    MildDementia => "Mild Dementia",
    ModerateDementia => "Moderate Dementia",
    NonDemented => "Non Demented",
    VeryMildDementia => "Very Mild Dementia",
});

/// Number of classifier outputs. Probability arrays are sized by this.
pub const NUM_CLASSES: usize = DementiaClass::COUNT;
