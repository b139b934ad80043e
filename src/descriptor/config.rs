//! Name/value configuration properties inside descriptors
//!
//! Connector and EJB descriptors carry settings as repeated property groups:
//!
//! ```xml
//! <config-property>
//!   <config-property-name>ConnectionURL</config-property-name>
//!   <config-property-type>java.lang.String</config-property-type>
//!   <config-property-value>tcp://localhost:61616</config-property-value>
//! </config-property>
//! ```
//!
//! A [`Configurable`] indexes the groups below one root element by
//! case-insensitive name, reads and overwrites their values, and appends new
//! groups for names that are not there yet.

use std::collections::HashMap;

use super::dom::{Document, Element, ElementPath};
use crate::error::{Error, Result};

/// Type recorded for properties created by [`Configurable::set_param`].
pub const DEFAULT_PROPERTY_TYPE: &str = "java.lang.String";

/// Element names making up one property group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyLayout {
    pub group: &'static str,
    pub name: &'static str,
    /// `None` for layouts without a type element.
    pub kind: Option<&'static str>,
    pub value: &'static str,
}

/// `config-property` in `ra.xml`.
pub const CONFIG_PROPERTY: PropertyLayout = PropertyLayout {
    group: "config-property",
    name: "config-property-name",
    kind: Some("config-property-type"),
    value: "config-property-value",
};

/// `activation-config-property` in `ejb-jar.xml`.
pub const ACTIVATION_CONFIG_PROPERTY: PropertyLayout = PropertyLayout {
    group: "activation-config-property",
    name: "activation-config-property-name",
    kind: None,
    value: "activation-config-property-value",
};

/// Where property groups are looked for, relative to the root element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Direct children only.
    Children,
    /// Any depth below the root.
    Descendants,
}

/// Property view over one element of a [`Document`].
#[derive(Debug)]
pub struct Configurable<'d> {
    document: &'d mut Document,
    root: ElementPath,
    layout: PropertyLayout,
    /// Lowercased name to property group; the first group of a name wins.
    properties: HashMap<String, ElementPath>,
}

impl<'d> Configurable<'d> {
    /// Index the `layout` groups found below `root` according to `scan`.
    pub fn new(
        document: &'d mut Document,
        root: ElementPath,
        layout: PropertyLayout,
        scan: Scan,
    ) -> Result<Self> {
        let root_element = document
            .element(&root)
            .ok_or_else(|| Error::ElementNotFound {
                criteria: format!("property root {root:?} in {}", document.path()),
            })?;

        let groups = match scan {
            Scan::Children => root_element
                .elements()
                .filter(|(_, e)| e.name() == layout.group)
                .map(|(index, _)| root.child(index))
                .collect(),
            Scan::Descendants => document.descendants_named(&root, layout.group),
        };

        let mut properties = HashMap::new();
        for group in groups {
            let name = document
                .element(&group)
                .and_then(|e| e.child(layout.name))
                .map(Element::text);
            if let Some(name) = name {
                properties.entry(name.to_lowercase()).or_insert(group);
            }
        }

        Ok(Self {
            document,
            root,
            layout,
            properties,
        })
    }

    /// Top-level `config-property` groups of the `resourceadapter` element.
    pub fn resource_adapter(document: &'d mut Document) -> Result<Self> {
        let root = document.find_by_name("resourceadapter")?;
        Self::new(document, root, CONFIG_PROPERTY, Scan::Children)
    }

    /// `config-property` groups of one outbound `connection-definition`.
    ///
    /// With an interface name, the definition whose
    /// `connectionfactory-interface` equals it is used; otherwise the first.
    pub fn outbound(
        document: &'d mut Document,
        connection_factory_interface: Option<&str>,
    ) -> Result<Self> {
        let root = match connection_factory_interface {
            Some(interface) => parent_of(
                document,
                document.find_by_text("connectionfactory-interface", interface)?,
            )?,
            None => document.find_by_name("connection-definition")?,
        };
        Self::new(document, root, CONFIG_PROPERTY, Scan::Children)
    }

    /// `activation-config` of the message-driven bean named `ejb_name`.
    ///
    /// The `activation-config` element is created if the bean has none.
    pub fn activation_config(document: &'d mut Document, ejb_name: &str) -> Result<Self> {
        let bean = parent_of(document, document.find_by_text("ejb-name", ejb_name)?)?;
        let bean_element = document
            .element_mut(&bean)
            .ok_or_else(|| Error::ElementNotFound {
                criteria: format!("message-driven bean {ejb_name}"),
            })?;

        let existing = bean_element
            .elements()
            .find(|(_, e)| e.name() == "activation-config")
            .map(|(index, _)| index);
        let index = match existing {
            Some(index) => index,
            None => bean_element.push_child(Element::new("activation-config")),
        };

        Self::new(document, bean.child(index), ACTIVATION_CONFIG_PROPERTY, Scan::Children)
    }

    /// Current value of `name`, matched case-insensitively.
    pub fn get_param(&self, name: &str) -> Option<String> {
        let group = self.properties.get(&name.to_lowercase())?;
        self.document
            .element(group)?
            .child(self.layout.value)
            .map(Element::text)
    }

    /// Overwrite the value of `name`, or append a new property group.
    pub fn set_param(&mut self, name: &str, value: &str) -> Result<()> {
        let key = name.to_lowercase();

        if let Some(group) = self.properties.get(&key) {
            let group_element =
                self.document
                    .element_mut(group)
                    .ok_or_else(|| Error::ElementNotFound {
                        criteria: format!("{} {name}", self.layout.group),
                    })?;
            match group_element.child_mut(self.layout.value) {
                Some(value_element) => value_element.set_text(value),
                None => {
                    group_element.push_child(Element::new(self.layout.value).with_text(value));
                },
            }
            return Ok(());
        }

        let mut group = Element::new(self.layout.group)
            .with_child(Element::new(self.layout.name).with_text(name));
        if let Some(kind) = self.layout.kind {
            group = group.with_child(Element::new(kind).with_text(DEFAULT_PROPERTY_TYPE));
        }
        group = group.with_child(Element::new(self.layout.value).with_text(value));

        let root_element =
            self.document
                .element_mut(&self.root)
                .ok_or_else(|| Error::ElementNotFound {
                    criteria: format!("property root {:?}", self.root),
                })?;
        let index = root_element.push_child(group);
        tracing::debug!(descriptor = self.document.path(), name, "added {}", self.layout.group);
        self.properties.insert(key, self.root.child(index));
        Ok(())
    }

    /// Property names as written in the descriptor, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .properties
            .values()
            .filter_map(|group| self.document.element(group)?.child(self.layout.name))
            .map(Element::text)
            .collect();
        names.sort();
        names
    }

    /// Element names this view reads and writes.
    pub fn layout(&self) -> PropertyLayout {
        self.layout
    }
}

fn parent_of(document: &Document, at: ElementPath) -> Result<ElementPath> {
    at.parent().ok_or_else(|| Error::ElementNotFound {
        criteria: format!("parent of <{}> in {}", document.root().name(), document.path()),
    })
}

/// Typed accessors over a [`Configurable`].
///
/// Each field line names a getter, a setter and the property name they
/// delegate to:
///
/// ```
/// earpatch::config_view! {
///     /// Pool settings.
///     pub struct PoolSettings {
///         max_size, set_max_size => "MaxPoolSize";
///     }
/// }
/// ```
#[macro_export]
macro_rules! config_view {
    (
        $(#[$meta:meta])*
        $vis:vis struct $view:ident {
            $( $getter:ident, $setter:ident => $key:literal; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug)]
        $vis struct $view<'d> {
            properties: $crate::descriptor::Configurable<'d>,
        }

        impl<'d> $view<'d> {
            pub fn new(properties: $crate::descriptor::Configurable<'d>) -> Self {
                Self { properties }
            }

            pub fn into_inner(self) -> $crate::descriptor::Configurable<'d> {
                self.properties
            }

            $(
                pub fn $getter(&self) -> Option<String> {
                    self.properties.get_param($key)
                }

                pub fn $setter(&mut self, value: &str) -> $crate::Result<()> {
                    self.properties.set_param($key, value)
                }
            )*
        }
    };
}

config_view! {
    /// Connection settings of a JMS resource adapter.
    pub struct ConnectorSettings {
        connection_url, set_connection_url => "ConnectionURL";
        user_name, set_user_name => "UserName";
        password, set_password => "Password";
        options, set_options => "Options";
    }
}

config_view! {
    /// Standard JMS activation properties of a message-driven bean.
    pub struct ActivationSettings {
        destination, set_destination => "destination";
        destination_type, set_destination_type => "destinationType";
        message_selector, set_message_selector => "messageSelector";
        acknowledge_mode, set_acknowledge_mode => "acknowledgeMode";
        subscription_durability, set_subscription_durability => "subscriptionDurability";
        client_id, set_client_id => "clientId";
        subscription_name, set_subscription_name => "subscriptionName";
    }
}
