use super::fields::{
    format_json, join_list, optional, parse_decimal, parse_int, parse_json, require,
    required_number, split_list,
};
use super::{EntityForm, FieldError, FormErrors, Validator};
use crate::entities::{
    Faq, Product, Project, Service, SettingValue, SpecialService, SystemSetting, WebApplication,
    WebsiteProject,
};

fn parse_i32(field: &'static str, raw: &str) -> Result<Option<i32>, FieldError> {
    match parse_int(field, raw)? {
        None => Ok(None),
        Some(value) => i32::try_from(value)
            .map(Some)
            .map_err(|_| FieldError::OutOfRange {
                field,
                input: value.to_string(),
            }),
    }
}

fn number_text<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn id_of(id: Option<&str>) -> String {
    id.unwrap_or_default().to_string()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectForm {
    pub name: String,
    pub country: String,
    pub description: String,
    pub image_url: String,
    /// Comma separated.
    pub technologies: String,
    pub features: String,
    pub achievements: String,
    /// JSON object text.
    pub stats: String,
    pub year: String,
    pub is_featured: bool,
}

impl EntityForm for ProjectForm {
    type Record = Project;

    fn from_record(record: &Project) -> Self {
        Self {
            name: record.name.clone(),
            country: record.country.clone(),
            description: record.description.clone(),
            image_url: record.image_url.clone().unwrap_or_default(),
            technologies: join_list(&record.technologies),
            features: join_list(&record.features),
            achievements: join_list(&record.achievements),
            stats: format_json(record.stats.as_ref()),
            year: number_text(record.year),
            is_featured: record.is_featured,
        }
    }

    fn to_record(&self, id: Option<&str>) -> Result<Project, FormErrors> {
        let mut v = Validator::new();
        let name = v.check(require("name", &self.name));
        let stats = v.check(parse_json("stats", &self.stats));
        let year = v.check(parse_i32("year", &self.year));
        v.finish()?;

        Ok(Project {
            id: id_of(id),
            name: name.unwrap_or_default(),
            country: self.country.trim().to_string(),
            description: self.description.trim().to_string(),
            image_url: optional(&self.image_url),
            technologies: split_list(&self.technologies),
            features: split_list(&self.features),
            achievements: split_list(&self.achievements),
            stats: stats.flatten(),
            year: year.flatten(),
            is_featured: self.is_featured,
            created_at: None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebApplicationForm {
    pub name: String,
    pub description: String,
    pub url: String,
    pub image_url: String,
    pub technologies: String,
    pub features: String,
    pub is_active: bool,
}

impl EntityForm for WebApplicationForm {
    type Record = WebApplication;

    fn from_record(record: &WebApplication) -> Self {
        Self {
            name: record.name.clone(),
            description: record.description.clone(),
            url: record.url.clone().unwrap_or_default(),
            image_url: record.image_url.clone().unwrap_or_default(),
            technologies: join_list(&record.technologies),
            features: join_list(&record.features),
            is_active: record.is_active,
        }
    }

    fn to_record(&self, id: Option<&str>) -> Result<WebApplication, FormErrors> {
        let mut v = Validator::new();
        let name = v.check(require("name", &self.name));
        v.finish()?;

        Ok(WebApplication {
            id: id_of(id),
            name: name.unwrap_or_default(),
            description: self.description.trim().to_string(),
            url: optional(&self.url),
            image_url: optional(&self.image_url),
            technologies: split_list(&self.technologies),
            features: split_list(&self.features),
            is_active: self.is_active,
            created_at: None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebsiteProjectForm {
    pub name: String,
    pub client: String,
    pub country: String,
    pub url: String,
    pub technologies: String,
    pub achievements: String,
    pub stats: String,
}

impl EntityForm for WebsiteProjectForm {
    type Record = WebsiteProject;

    fn from_record(record: &WebsiteProject) -> Self {
        Self {
            name: record.name.clone(),
            client: record.client.clone(),
            country: record.country.clone(),
            url: record.url.clone().unwrap_or_default(),
            technologies: join_list(&record.technologies),
            achievements: join_list(&record.achievements),
            stats: format_json(record.stats.as_ref()),
        }
    }

    fn to_record(&self, id: Option<&str>) -> Result<WebsiteProject, FormErrors> {
        let mut v = Validator::new();
        let name = v.check(require("name", &self.name));
        let stats = v.check(parse_json("stats", &self.stats));
        v.finish()?;

        Ok(WebsiteProject {
            id: id_of(id),
            name: name.unwrap_or_default(),
            client: self.client.trim().to_string(),
            country: self.country.trim().to_string(),
            url: optional(&self.url),
            technologies: split_list(&self.technologies),
            achievements: split_list(&self.achievements),
            stats: stats.flatten(),
            created_at: None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub price: String,
    pub currency: String,
    pub category: String,
    pub image_url: String,
    pub features: String,
    pub stock: String,
    pub is_active: bool,
}

impl EntityForm for ProductForm {
    type Record = Product;

    fn from_record(record: &Product) -> Self {
        Self {
            name: record.name.clone(),
            description: record.description.clone(),
            price: record.price.to_string(),
            currency: record.currency.clone(),
            category: record.category.clone(),
            image_url: record.image_url.clone().unwrap_or_default(),
            features: join_list(&record.features),
            stock: record.stock.to_string(),
            is_active: record.is_active,
        }
    }

    fn to_record(&self, id: Option<&str>) -> Result<Product, FormErrors> {
        let mut v = Validator::new();
        let name = v.check(require("name", &self.name));
        let price = v.check(required_number("price", parse_decimal("price", &self.price)));
        let stock = v.check(parse_int("stock", &self.stock));
        v.finish()?;

        Ok(Product {
            id: id_of(id),
            name: name.unwrap_or_default(),
            description: self.description.trim().to_string(),
            price: price.unwrap_or_default(),
            currency: self.currency.trim().to_string(),
            category: self.category.trim().to_string(),
            image_url: optional(&self.image_url),
            features: split_list(&self.features),
            stock: stock.flatten().unwrap_or_default(),
            is_active: self.is_active,
            created_at: None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceForm {
    pub title: String,
    pub description: String,
    pub icon: String,
    pub features: String,
    pub price: String,
    pub sort_order: String,
    pub is_active: bool,
}

impl EntityForm for ServiceForm {
    type Record = Service;

    fn from_record(record: &Service) -> Self {
        Self {
            title: record.title.clone(),
            description: record.description.clone(),
            icon: record.icon.clone().unwrap_or_default(),
            features: join_list(&record.features),
            price: number_text(record.price),
            sort_order: record.sort_order.to_string(),
            is_active: record.is_active,
        }
    }

    fn to_record(&self, id: Option<&str>) -> Result<Service, FormErrors> {
        let mut v = Validator::new();
        let title = v.check(require("title", &self.title));
        let price = v.check(parse_decimal("price", &self.price));
        let sort_order = v.check(parse_i32("sort_order", &self.sort_order));
        v.finish()?;

        Ok(Service {
            id: id_of(id),
            title: title.unwrap_or_default(),
            description: self.description.trim().to_string(),
            icon: optional(&self.icon),
            features: split_list(&self.features),
            price: price.flatten(),
            sort_order: sort_order.flatten().unwrap_or_default(),
            is_active: self.is_active,
            created_at: None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecialServiceForm {
    pub title: String,
    pub description: String,
    pub features: String,
    pub price: String,
    pub is_active: bool,
}

impl EntityForm for SpecialServiceForm {
    type Record = SpecialService;

    fn from_record(record: &SpecialService) -> Self {
        Self {
            title: record.title.clone(),
            description: record.description.clone(),
            features: join_list(&record.features),
            price: number_text(record.price),
            is_active: record.is_active,
        }
    }

    fn to_record(&self, id: Option<&str>) -> Result<SpecialService, FormErrors> {
        let mut v = Validator::new();
        let title = v.check(require("title", &self.title));
        let price = v.check(parse_decimal("price", &self.price));
        v.finish()?;

        Ok(SpecialService {
            id: id_of(id),
            title: title.unwrap_or_default(),
            description: self.description.trim().to_string(),
            features: split_list(&self.features),
            price: price.flatten(),
            is_active: self.is_active,
            created_at: None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaqForm {
    pub question: String,
    pub answer: String,
    pub category: String,
    pub sort_order: String,
    pub is_published: bool,
}

impl EntityForm for FaqForm {
    type Record = Faq;

    fn from_record(record: &Faq) -> Self {
        Self {
            question: record.question.clone(),
            answer: record.answer.clone(),
            category: record.category.clone().unwrap_or_default(),
            sort_order: record.sort_order.to_string(),
            is_published: record.is_published,
        }
    }

    fn to_record(&self, id: Option<&str>) -> Result<Faq, FormErrors> {
        let mut v = Validator::new();
        let question = v.check(require("question", &self.question));
        let answer = v.check(require("answer", &self.answer));
        let sort_order = v.check(parse_i32("sort_order", &self.sort_order));
        v.finish()?;

        Ok(Faq {
            id: id_of(id),
            question: question.unwrap_or_default(),
            answer: answer.unwrap_or_default(),
            category: optional(&self.category),
            sort_order: sort_order.flatten().unwrap_or_default(),
            is_published: self.is_published,
            created_at: None,
        })
    }
}

/// Settings are either a toggle or free text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingForm {
    pub key: String,
    pub text: String,
    /// `Some` for toggle settings; `text` is ignored then.
    pub toggle: Option<bool>,
    pub description: String,
}

impl EntityForm for SettingForm {
    type Record = SystemSetting;

    fn from_record(record: &SystemSetting) -> Self {
        let (text, toggle) = match &record.value {
            SettingValue::Flag(flag) => (String::new(), Some(*flag)),
            SettingValue::Text(text) => (text.clone(), None),
        };
        Self {
            key: record.key.clone(),
            text,
            toggle,
            description: record.description.clone().unwrap_or_default(),
        }
    }

    fn to_record(&self, id: Option<&str>) -> Result<SystemSetting, FormErrors> {
        let mut v = Validator::new();
        let key = v.check(require("key", &self.key));
        v.finish()?;

        Ok(SystemSetting {
            id: id_of(id),
            key: key.unwrap_or_default(),
            value: match self.toggle {
                Some(flag) => SettingValue::Flag(flag),
                None => SettingValue::Text(self.text.clone()),
            },
            description: optional(&self.description),
            created_at: None,
        })
    }
}
