//! Atom and plain XML payloads (V3 namespaces).

/// `GET People(1)`: a conforming Atom entry for `Demo.Person`.
pub const ATOM_ENTRY_PERSON: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<entry xml:base="http://host/svc.svc/" xmlns="http://www.w3.org/2005/Atom" xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices" xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata" m:etag="W/&quot;'Ann'&quot;">
  <id>http://host/svc.svc/People(1)</id>
  <category term="Demo.Person" scheme="http://schemas.microsoft.com/ado/2007/08/dataservices/scheme"/>
  <link rel="edit" title="Person" href="People(1)"/>
  <link rel="http://schemas.microsoft.com/ado/2007/08/dataservices/related/Friends" type="application/atom+xml;type=feed" title="Friends" href="People(1)/Friends"/>
  <link rel="http://schemas.microsoft.com/ado/2007/08/dataservices/related/BestFriend" type="application/atom+xml;type=entry" title="BestFriend" href="People(1)/BestFriend"/>
  <title/>
  <updated>2026-01-01T00:00:00Z</updated>
  <author><name/></author>
  <content type="application/xml">
    <m:properties>
      <d:Id m:type="Edm.Int32">1</d:Id>
      <d:Name>Ann</d:Name>
      <d:Age m:type="Edm.Int32" m:null="true"/>
    </m:properties>
  </content>
</entry>
"#;

/// `GET People(2)`: the `d:Nickname` property on line 14 is not declared.
pub const ATOM_ENTRY_UNDECLARED_PROPERTY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<entry xml:base="http://host/svc.svc/" xmlns="http://www.w3.org/2005/Atom" xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices" xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
  <id>http://host/svc.svc/People(2)</id>
  <category term="Demo.Person" scheme="http://schemas.microsoft.com/ado/2007/08/dataservices/scheme"/>
  <link rel="edit" title="Person" href="People(2)"/>
  <title/>
  <updated>2026-01-01T00:00:00Z</updated>
  <author><name/></author>
  <content type="application/xml">
    <m:properties>
      <d:Id m:type="Edm.Int32">2</d:Id>
      <d:Name>Bob</d:Name>
      <d:Age m:type="Edm.Int32">41</d:Age>
      <d:Nickname>Bobby</d:Nickname>
    </m:properties>
  </content>
</entry>
"#;

/// `GET People`: a feed of two entries.
pub const ATOM_FEED_PEOPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xml:base="http://host/svc.svc/" xmlns="http://www.w3.org/2005/Atom" xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices" xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
  <id>http://host/svc.svc/People</id>
  <title type="text">People</title>
  <updated>2026-01-01T00:00:00Z</updated>
  <link rel="self" title="People" href="People"/>
  <entry>
    <id>http://host/svc.svc/People(1)</id>
    <category term="Demo.Person" scheme="http://schemas.microsoft.com/ado/2007/08/dataservices/scheme"/>
    <link rel="edit" title="Person" href="People(1)"/>
    <title/>
    <updated>2026-01-01T00:00:00Z</updated>
    <author><name/></author>
    <content type="application/xml">
      <m:properties>
        <d:Id m:type="Edm.Int32">1</d:Id>
        <d:Name>Ann</d:Name>
        <d:Age m:type="Edm.Int32" m:null="true"/>
      </m:properties>
    </content>
  </entry>
  <entry>
    <id>http://host/svc.svc/People(3)</id>
    <category term="Demo.Employee" scheme="http://schemas.microsoft.com/ado/2007/08/dataservices/scheme"/>
    <link rel="edit" title="Person" href="People(3)/Demo.Employee"/>
    <title/>
    <updated>2026-01-01T00:00:00Z</updated>
    <author><name/></author>
    <content type="application/xml">
      <m:properties>
        <d:Id m:type="Edm.Int32">3</d:Id>
        <d:Name>Cy</d:Name>
        <d:Age m:type="Edm.Int32">30</d:Age>
        <d:Salary m:type="Edm.Decimal">10</d:Salary>
      </m:properties>
    </content>
  </entry>
</feed>
"#;

/// A feed without `atom:title`.
pub const ATOM_FEED_NO_TITLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xml:base="http://host/svc.svc/" xmlns="http://www.w3.org/2005/Atom">
  <id>http://host/svc.svc/People</id>
  <updated>2026-01-01T00:00:00Z</updated>
  <link rel="self" title="People" href="People"/>
</feed>
"#;

/// `GET /`: AtomPub service document listing both entity sets.
pub const ATOM_SERVICE_DOCUMENT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<service xml:base="http://host/svc.svc/" xmlns="http://www.w3.org/2007/app" xmlns:atom="http://www.w3.org/2005/Atom">
  <workspace>
    <atom:title>Default</atom:title>
    <collection href="People"><atom:title>People</atom:title></collection>
    <collection href="Photos"><atom:title>Photos</atom:title></collection>
  </workspace>
</service>
"#;

/// `GET People(1)/$links/Friends`.
pub const XML_LINKS_FRIENDS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<links xmlns="http://schemas.microsoft.com/ado/2007/08/dataservices">
  <uri>http://host/svc.svc/People(2)</uri>
  <uri>http://host/svc.svc/People(3)</uri>
</links>
"#;

/// An XML error document.
pub const XML_METADATA_ERROR: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<m:error xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
  <m:code>NotFound</m:code>
  <m:message xml:lang="en-US">Resource not found for the segment 'People'.</m:message>
</m:error>
"#;
