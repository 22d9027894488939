//! Per-element node construction.

use super::{unknown_element, TreeBuilder};
use crate::components::{ComponentKey, Role};
use crate::config::Configuration;
use crate::errors::{codes, ConfigurationError};
use crate::tree::{
    parse_labels, ActNode, ActTarget, AggregateNode, AggregatePart, CallFunctionNode,
    ComponentBinding, ElementTemplate, GenerateNode, MatchNode, MountNode, Node, ReadNode,
    RedirectNode, SelectCase, SelectNode, SelectStrategy, SerializeNode, TransformNode,
    ViewBinding, FIRST_POSITION, LAST_POSITION,
};
use crate::variables::{ParameterTemplate, VariableResolver};

impl TreeBuilder<'_> {
    /// Builds the node children of an element; `parameter` and
    /// `handle-errors` children belong to the element itself.
    pub(super) fn build_children(&self, parent: &Configuration) -> Result<Vec<Node>, ConfigurationError> {
        parent
            .children
            .iter()
            .filter(|child| child.name != "parameter" && child.name != "handle-errors")
            .map(|child| self.build_node(child, &parent.name))
            .collect()
    }

    fn build_node(&self, config: &Configuration, parent: &str) -> Result<Node, ConfigurationError> {
        match config.name.as_str() {
            "match" => self.build_match(config),
            "select" => self.build_select(config),
            "act" => self.build_act(config),
            "generate" => self.build_generate(config),
            "transform" => self.build_transform(config),
            "serialize" => self.build_serialize(config),
            "read" => self.build_read(config),
            "aggregate" => self.build_aggregate(config),
            "mount" => self.build_mount(config),
            "call" => self.build_call(config),
            "redirect-to" => self.build_redirect(config),
            _ => Err(unknown_element(config, parent)),
        }
    }

    fn expression(&self, config: &Configuration, value: &str) -> Result<VariableResolver, ConfigurationError> {
        VariableResolver::parse(value, self.registry).map_err(|e| e.at(&config.location))
    }

    fn optional_expression(
        &self,
        config: &Configuration,
        name: &str,
    ) -> Result<Option<VariableResolver>, ConfigurationError> {
        config
            .attribute(name)
            .map(|value| self.expression(config, value))
            .transpose()
    }

    fn required_expression(
        &self,
        config: &Configuration,
        name: &str,
    ) -> Result<VariableResolver, ConfigurationError> {
        self.expression(config, config.required_attribute(name)?)
    }

    fn parameters(&self, config: &Configuration) -> Result<ParameterTemplate, ConfigurationError> {
        ParameterTemplate::from_config(config, self.registry)
    }

    fn key(config: &Configuration, role: Role) -> ComponentKey {
        ComponentKey::new(role, config.attribute("type"))
    }

    fn views_for(&self, config: &Configuration, implicit: Option<&str>) -> ViewBinding {
        let mut labels = parse_labels(config.attribute("label"));
        labels.extend(implicit.map(String::from));
        ViewBinding::new(labels, self.views.clone())
    }

    fn binding(&self, config: &Configuration, type_name: String) -> Result<ComponentBinding, ConfigurationError> {
        Ok(ComponentBinding::new(
            type_name,
            self.optional_expression(config, "src")?,
            self.parameters(config)?,
        ))
    }

    fn status_code(config: &Configuration) -> Result<Option<u16>, ConfigurationError> {
        config
            .attribute("status-code")
            .map(|value| {
                value.parse::<u16>().map_err(|_| {
                    ConfigurationError::coded(
                        codes::BAD_PATTERN,
                        format!("Invalid status code '{value}' on <{}>", config.name),
                    )
                    .at(&config.location)
                })
            })
            .transpose()
    }

    fn build_match(&self, config: &Configuration) -> Result<Node, ConfigurationError> {
        let (type_name, matcher) = self
            .registry
            .matcher(&Self::key(config, Role::Matcher))
            .map_err(|e| e.at(&config.location))?;
        let node = MatchNode::new(
            config.attribute("name").map(String::from),
            type_name,
            matcher,
            self.required_expression(config, "pattern")?,
            self.parameters(config)?,
            self.build_children(config)?,
            config.location.clone(),
        )?;
        Ok(Node::Match(node))
    }

    fn build_select(&self, config: &Configuration) -> Result<Node, ConfigurationError> {
        let (type_name, selector) = self
            .registry
            .selector(&Self::key(config, Role::Selector))
            .map_err(|e| e.at(&config.location))?;
        let mut cases = Vec::new();
        let mut otherwise = None;
        for child in &config.children {
            match child.name.as_str() {
                "when" => cases.push(SelectCase::new(
                    self.required_expression(child, "test")?,
                    self.build_children(child)?,
                )),
                "otherwise" if otherwise.is_none() => otherwise = Some(self.build_children(child)?),
                "otherwise" => {
                    return Err(ConfigurationError::coded(
                        codes::DUPLICATE,
                        "<select> has more than one <otherwise>",
                    )
                    .at(&child.location))
                }
                "parameter" => {}
                _ => return Err(unknown_element(child, "select")),
            }
        }
        Ok(Node::Select(SelectNode::new(
            type_name,
            SelectStrategy::for_selector(selector),
            cases,
            otherwise,
            self.parameters(config)?,
            config.location.clone(),
        )))
    }

    fn build_act(&self, config: &Configuration) -> Result<Node, ConfigurationError> {
        let target = match (config.attribute("type"), config.attribute("set")) {
            (Some(type_name), None) => {
                let key = ComponentKey::new(Role::Action, Some(type_name));
                let (type_name, action) = self.registry.action(&key).map_err(|e| e.at(&config.location))?;
                ActTarget::Action { type_name, action }
            }
            (None, Some(set)) => {
                let set = self.action_sets.get(set).cloned().ok_or_else(|| {
                    ConfigurationError::coded(
                        codes::UNKNOWN_COMPONENT,
                        format!("No action-set named '{set}'"),
                    )
                    .at(&config.location)
                })?;
                ActTarget::Set(set)
            }
            _ => {
                return Err(ConfigurationError::coded(
                    codes::ACT_TARGET,
                    "<act> needs exactly one of 'type' and 'set'",
                )
                .at(&config.location))
            }
        };
        let source = self
            .optional_expression(config, "src")?
            .unwrap_or_else(|| VariableResolver::literal(""));
        Ok(Node::Act(ActNode::new(
            config.attribute("name").map(String::from),
            target,
            source,
            self.parameters(config)?,
            self.build_children(config)?,
            config.location.clone(),
        )))
    }

    fn build_generate(&self, config: &Configuration) -> Result<Node, ConfigurationError> {
        let (type_name, generator) = self
            .registry
            .generator(&Self::key(config, Role::Generator))
            .map_err(|e| e.at(&config.location))?;
        Ok(Node::Generate(GenerateNode::new(
            self.binding(config, type_name)?,
            generator,
            self.views_for(config, Some(FIRST_POSITION)),
            config.location.clone(),
        )))
    }

    fn build_transform(&self, config: &Configuration) -> Result<Node, ConfigurationError> {
        let (type_name, transformer) = self
            .registry
            .transformer(&Self::key(config, Role::Transformer))
            .map_err(|e| e.at(&config.location))?;
        Ok(Node::Transform(TransformNode::new(
            self.binding(config, type_name)?,
            transformer,
            self.views_for(config, None),
            config.location.clone(),
        )))
    }

    fn build_serialize(&self, config: &Configuration) -> Result<Node, ConfigurationError> {
        let (type_name, serializer) = self
            .registry
            .serializer(&Self::key(config, Role::Serializer))
            .map_err(|e| e.at(&config.location))?;
        Ok(Node::Serialize(SerializeNode::new(
            self.binding(config, type_name)?,
            serializer,
            self.optional_expression(config, "mime-type")?,
            Self::status_code(config)?,
            self.views_for(config, Some(LAST_POSITION)),
            config.location.clone(),
        )))
    }

    fn build_read(&self, config: &Configuration) -> Result<Node, ConfigurationError> {
        let (type_name, reader) = self
            .registry
            .reader(&Self::key(config, Role::Reader))
            .map_err(|e| e.at(&config.location))?;
        Ok(Node::Read(ReadNode::new(
            self.binding(config, type_name)?,
            reader,
            self.optional_expression(config, "mime-type")?,
            Self::status_code(config)?,
            config.location.clone(),
        )))
    }

    fn element_template(
        &self,
        config: &Configuration,
        element: &str,
    ) -> Result<ElementTemplate, ConfigurationError> {
        let literal_or = |name: &str| -> Result<VariableResolver, ConfigurationError> {
            Ok(self
                .optional_expression(config, name)?
                .unwrap_or_else(|| VariableResolver::literal("")))
        };
        Ok(ElementTemplate::new(
            self.expression(config, element)?,
            literal_or("ns")?,
            literal_or("prefix")?,
        ))
    }

    fn build_aggregate(&self, config: &Configuration) -> Result<Node, ConfigurationError> {
        let root = self.element_template(config, config.required_attribute("element")?)?;
        let mut parts = Vec::new();
        for part in &config.children {
            if part.name != "part" {
                return Err(unknown_element(part, "aggregate"));
            }
            let element = part
                .attribute("element")
                .map(|element| self.element_template(part, element))
                .transpose()?;
            parts.push(AggregatePart::new(
                self.required_expression(part, "src")?,
                element,
                part.bool_attribute("strip-root", false)?,
                parse_labels(part.attribute("label")),
            ));
        }
        Ok(Node::Aggregate(AggregateNode::new(
            root,
            parts,
            self.views_for(config, Some(FIRST_POSITION)),
            config.location.clone(),
        )))
    }

    fn build_mount(&self, config: &Configuration) -> Result<Node, ConfigurationError> {
        Ok(Node::Mount(MountNode::new(
            self.required_expression(config, "src")?,
            self.required_expression(config, "uri-prefix")?,
            config.bool_attribute("pass-through", false)?,
            config.location.clone(),
        )))
    }

    fn build_call(&self, config: &Configuration) -> Result<Node, ConfigurationError> {
        let interpreter = self.interpreter.clone().ok_or_else(|| {
            ConfigurationError::coded(
                codes::MISSING_FLOW,
                "<call> requires a <flow> declaration in the sitemap",
            )
            .at(&config.location)
        })?;
        let function = self.optional_expression(config, "function")?;
        let continuation = self.optional_expression(config, "continuation")?;
        if function.is_none() && continuation.is_none() {
            return Err(ConfigurationError::coded(
                codes::MISSING_ATTRIBUTE,
                "<call> needs 'function' or 'continuation'",
            )
            .at(&config.location));
        }
        Ok(Node::Call(CallFunctionNode::new(
            function,
            continuation,
            self.parameters(config)?,
            interpreter,
            config.location.clone(),
        )))
    }

    fn build_redirect(&self, config: &Configuration) -> Result<Node, ConfigurationError> {
        Ok(Node::Redirect(RedirectNode::new(
            self.required_expression(config, "uri")?,
            config.bool_attribute("permanent", false)?,
            config.location.clone(),
        )))
    }
}
